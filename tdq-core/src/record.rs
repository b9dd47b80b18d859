//! Types for recording training metrics.
//!
//! An agent returns a [`Record`] from its training step so that the caller can log
//! the loss and other diagnostics.
mod base;

pub use base::{Record, RecordValue};
