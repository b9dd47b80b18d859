//! Interface of function approximators used in the DQN agent.
use anyhow::Result;
use candle_core::Tensor;
use candle_nn::VarBuilder;

/// Time-conditioned action-value function for continuous actions, not owning its
/// [`VarMap`] internally.
///
/// The parameters live in the [`VarMap`] behind the [`VarBuilder`] given to
/// [`QFunction::build`], so the owner of the `VarMap` can export, import and copy
/// them. Building the same configuration into two `VarMap`s yields two
/// structurally identical, independent networks.
///
/// Shapes: `state` is `[batch, state_dim]`, `timestep` is `[batch]`, `action` is
/// `[batch, action_dim]`.
///
/// [`VarMap`]: candle_nn::VarMap
pub trait QFunction {
    /// Configuration from which [`QFunction`] is constructed.
    type Config;

    /// Builds [`QFunction`] with [`VarBuilder`] and [`QFunction::Config`].
    fn build(vb: VarBuilder, config: Self::Config) -> Result<Self>
    where
        Self: Sized;

    /// Returns action values of shape `[batch]`.
    ///
    /// With `action`, the value of that action. Without, the value of the greedy
    /// action, i.e. the maximum over actions.
    fn forward(&self, state: &Tensor, timestep: &Tensor, action: Option<&Tensor>)
        -> Result<Tensor>;

    /// Returns the greedy actions of shape `[batch, action_dim]`.
    fn sample_action(&self, state: &Tensor, timestep: &Tensor) -> Result<Tensor>;

    /// Switches layers behaving differently in training, e.g. dropout.
    fn set_train(&mut self, train: bool);

    /// Returns `true` in training mode.
    fn is_train(&self) -> bool;
}
