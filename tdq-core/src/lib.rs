#![warn(missing_docs)]
//! Core traits and data types for time-conditioned DQN agents.
//!
//! Nothing in this crate depends on a tensor backend. An agent implemented with a
//! concrete backend, such as `tdq-candle-agent`, implements [`Agent`] and consumes
//! transitions through [`ReplayMemory`].
pub mod error;
pub mod record;
pub mod replay_buffer;

mod base;
pub use base::{Agent, Configurable, ReplayMemory, Transition, TransitionBatch};
pub use error::TdqError;
