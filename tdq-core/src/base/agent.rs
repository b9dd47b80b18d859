//! Agent.
use super::ReplayMemory;
use crate::record::Record;
use anyhow::Result;
use std::path::Path;

/// Represents a trainable Q-learning agent acting in a continuous action space.
///
/// The agent owns an online network, a target network and an optimizer. An external
/// training loop drives it: it calls [`Agent::sample_action`] while interacting with
/// an environment, pushes transitions into a [`ReplayMemory`], calls
/// [`Agent::train`] periodically and [`Agent::update`] on a slower cadence.
pub trait Agent {
    /// Samples an action for the given state and timestep.
    ///
    /// With probability `explore_prob` a uniformly random action within the action
    /// bounds is returned, otherwise the action chosen by the function approximator.
    fn sample_action(&mut self, state: &[f32], timestep: f32, explore_prob: f64)
        -> Result<Vec<f32>>;

    /// Performs a single step of Q-learning and returns the loss.
    ///
    /// `memory` is a replay memory from which `batch_size` transitions will be taken
    /// for updating the online network. `gamma` is the discount factor.
    fn train<R: ReplayMemory>(
        &mut self,
        memory: &mut R,
        gamma: f64,
        batch_size: usize,
    ) -> Result<f32> {
        let record = self.train_with_record(memory, gamma, batch_size)?;
        Ok(record.get_scalar("loss")?)
    }

    /// Performs a single step of Q-learning and returns some information.
    ///
    /// The returned record contains at least the scalar `loss`.
    fn train_with_record<R: ReplayMemory>(
        &mut self,
        memory: &mut R,
        gamma: f64,
        batch_size: usize,
    ) -> Result<Record>;

    /// Copies the online network parameters into the target network.
    fn update(&mut self) -> Result<()>;

    /// Saves the online network parameters in the given directory.
    ///
    /// The directory is created if it does not exist.
    fn save_checkpoint(&self, path: &Path) -> Result<()>;

    /// Loads the online network parameters from the given directory and
    /// synchronizes the target network.
    ///
    /// Fails with [`TdqError::CheckpointNotFound`](crate::TdqError::CheckpointNotFound)
    /// if the directory does not exist.
    fn load_checkpoint(&mut self, path: &Path) -> Result<()>;
}

