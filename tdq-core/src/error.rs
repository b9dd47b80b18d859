//! Errors in the library.
use std::path::PathBuf;
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug)]
pub enum TdqError {
    /// A required configuration field is missing or malformed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The checkpoint directory does not exist.
    #[error("No checkpoint directory <{0}>")]
    CheckpointNotFound(PathBuf),

    /// Parameter names or shapes disagree with the network.
    #[error("Structural mismatch: {0}")]
    StructuralMismatch(String),

    /// The sequences of a transition batch are not aligned.
    #[error("Batch mismatch: {0}")]
    BatchMismatch(String),

    /// Sampling was requested from a memory holding no transitions.
    #[error("Cannot sample from an empty replay memory")]
    EmptyMemory,

    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),
}
