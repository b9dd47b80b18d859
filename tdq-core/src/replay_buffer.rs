//! A simple replay memory with uniform sampling.
mod base;
mod config;
pub use base::SimpleReplayMemory;
pub use config::SimpleReplayMemoryConfig;
