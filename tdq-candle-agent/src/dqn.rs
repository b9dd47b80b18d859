//! DQN agent for continuous actions.
mod base;
mod config;
mod explorer;
mod model;
pub use base::{Dqn, MODEL_FILE};
pub use config::DqnConfig;
pub use explorer::{ActionBounds, EpsilonSchedule};
pub use model::{InferenceGuard, QModel};
