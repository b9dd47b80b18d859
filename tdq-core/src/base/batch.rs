//! Transitions and batches of transitions.
use crate::error::TdqError;
use serde::{Deserialize, Serialize};

/// One `(s_t, a_t, r_t, s_t+1, terminal_t, t)` tuple from environment interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    /// State `s_t`.
    pub state: Vec<f32>,

    /// Action `a_t` taken in `s_t`.
    pub action: Vec<f32>,

    /// Reward `r_t`.
    pub reward: f32,

    /// Next state `s_t+1`.
    pub next_state: Vec<f32>,

    /// Flag denoting if the episode terminated at `s_t+1`.
    pub is_terminal: bool,

    /// Timestep `t` of `s_t`.
    pub timestep: f32,
}

impl Transition {
    /// Constructs a [`Transition`].
    pub fn new(
        state: Vec<f32>,
        action: Vec<f32>,
        reward: f32,
        next_state: Vec<f32>,
        is_terminal: bool,
        timestep: f32,
    ) -> Self {
        Self {
            state,
            action,
            reward,
            next_state,
            is_terminal,
            timestep,
        }
    }
}

/// A batch of transitions stored as six aligned sequences.
///
/// Element `i` of every sequence describes the same transition. States and actions
/// are flattened row-major, so `state` holds `len() * state_dim` values.
/// `terminal` holds `1.0` for terminal transitions and `0.0` otherwise, because it
/// is used arithmetically in the Q-learning target.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransitionBatch {
    /// States `s_t`.
    pub state: Vec<f32>,

    /// Actions `a_t`.
    pub action: Vec<f32>,

    /// Rewards `r_t`.
    pub reward: Vec<f32>,

    /// Next states `s_t+1`.
    pub next_state: Vec<f32>,

    /// Terminal flags as `0.0`/`1.0`.
    pub terminal: Vec<f32>,

    /// Timesteps `t`.
    pub timestep: Vec<f32>,
}

impl TransitionBatch {
    /// Collects transitions into a batch.
    pub fn from_transitions<'a>(trs: impl IntoIterator<Item = &'a Transition>) -> Self {
        let mut batch = Self::default();
        for tr in trs {
            batch.state.extend_from_slice(&tr.state);
            batch.action.extend_from_slice(&tr.action);
            batch.reward.push(tr.reward);
            batch.next_state.extend_from_slice(&tr.next_state);
            batch.terminal.push(if tr.is_terminal { 1.0 } else { 0.0 });
            batch.timestep.push(tr.timestep);
        }
        batch
    }

    /// Returns the number of transitions in the batch.
    pub fn len(&self) -> usize {
        self.reward.len()
    }

    /// Returns `true` if the batch holds no transitions.
    pub fn is_empty(&self) -> bool {
        self.reward.is_empty()
    }

    /// Checks that all sequences describe the same number of transitions.
    pub fn validate(&self, state_dim: usize, action_dim: usize) -> Result<(), TdqError> {
        let n = self.len();
        let check = |name: &str, len: usize, expected: usize| {
            if len == expected {
                Ok(())
            } else {
                Err(TdqError::BatchMismatch(format!(
                    "{} has {} elements, expected {}",
                    name, len, expected
                )))
            }
        };
        check("state", self.state.len(), n * state_dim)?;
        check("action", self.action.len(), n * action_dim)?;
        check("next_state", self.next_state.len(), n * state_dim)?;
        check("terminal", self.terminal.len(), n)?;
        check("timestep", self.timestep.len(), n)?;

        if let Some(v) = self.terminal.iter().find(|&&v| v != 0.0 && v != 1.0) {
            return Err(TdqError::BatchMismatch(format!(
                "terminal flag must be 0.0 or 1.0, got {}",
                v
            )));
        }
        Ok(())
    }

    /// Unpacks the data `(s_t, a_t, r_t, s_t+1, terminal_t, t)`.
    pub fn unpack(
        self,
    ) -> (
        Vec<f32>,
        Vec<f32>,
        Vec<f32>,
        Vec<f32>,
        Vec<f32>,
        Vec<f32>,
    ) {
        (
            self.state,
            self.action,
            self.reward,
            self.next_state,
            self.terminal,
            self.timestep,
        )
    }
}
