//! Replay memory interface.
use super::{Transition, TransitionBatch};
use anyhow::Result;

/// Interface of replay memories consumed by agents.
///
/// A replay memory holds [`Transition`]s and returns minibatches of a fixed size.
/// How transitions are stored and which of them are sampled is up to the
/// implementation; the agent only relies on the returned [`TransitionBatch`]
/// being aligned.
pub trait ReplayMemory {
    /// Pushes a transition into the memory.
    fn push(&mut self, tr: Transition) -> Result<()>;

    /// Returns the current number of transitions in the memory.
    fn len(&self) -> usize;

    /// Returns `true` if the memory holds no transitions.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Samples a batch of `batch_size` transitions.
    fn sample(&mut self, batch_size: usize) -> Result<TransitionBatch>;
}
