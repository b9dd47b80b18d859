use crate::{dqn::ActionBounds, util::ModelDims};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`NafMlp`](super::NafMlp).
pub struct NafMlpConfig {
    pub(super) state_dim: usize,
    pub(super) units: Vec<usize>,
    pub(super) action_dim: usize,

    /// Greedy actions are squashed into these bounds.
    #[serde(default = "default_action_bounds")]
    pub(super) action_bounds: ActionBounds,

    /// Timesteps are multiplied by this value before entering the network.
    #[serde(default = "default_time_scale")]
    pub(super) time_scale: f64,

    /// Dropout probability of hidden layers in training mode.
    #[serde(default)]
    pub(super) dropout: f32,
}

fn default_action_bounds() -> ActionBounds {
    ActionBounds::Scalar(-1.0, 1.0)
}

fn default_time_scale() -> f64 {
    1.0
}

impl NafMlpConfig {
    /// Creates configuration of the network.
    ///
    /// * `units` - Numbers of units in hidden layers.
    pub fn new(state_dim: usize, units: Vec<usize>, action_dim: usize) -> Self {
        Self {
            state_dim,
            units,
            action_dim,
            action_bounds: default_action_bounds(),
            time_scale: default_time_scale(),
            dropout: 0.0,
        }
    }

    /// Sets the bounds of greedy actions.
    pub fn action_bounds(mut self, v: ActionBounds) -> Self {
        self.action_bounds = v;
        self
    }

    /// Sets the scale applied to timesteps.
    pub fn time_scale(mut self, v: f64) -> Self {
        self.time_scale = v;
        self
    }

    /// Sets the dropout probability.
    pub fn dropout(mut self, p: f32) -> Self {
        self.dropout = p;
        self
    }
}

impl ModelDims for NafMlpConfig {
    fn state_dim(&self) -> usize {
        self.state_dim
    }

    fn action_dim(&self) -> usize {
        self.action_dim
    }

    fn set_action_dim(&mut self, v: usize) {
        self.action_dim = v;
    }

    fn get_action_bounds(&self) -> Option<&ActionBounds> {
        Some(&self.action_bounds)
    }

    fn set_action_bounds(&mut self, v: ActionBounds) {
        self.action_bounds = v;
    }
}
