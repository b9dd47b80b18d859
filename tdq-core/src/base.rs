//! Core functionalities.
mod agent;
mod batch;
mod policy;
mod replay_buffer;
pub use agent::Agent;
pub use batch::{Transition, TransitionBatch};
pub use policy::Configurable;
pub use replay_buffer::ReplayMemory;
