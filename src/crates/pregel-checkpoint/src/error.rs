//! Error types for channel and checkpoint operations

use thiserror::Error;

/// Result type for channel and checkpoint operations
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Errors that can occur while reading/updating channels or persisting checkpoints
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// Channel read before any value was written
    #[error("channel is empty")]
    EmptyChannel,

    /// Channel rejected the writes it received this step
    #[error("invalid channel update: {0}")]
    InvalidUpdate(String),

    /// Checkpoint not found
    #[error("checkpoint not found: {0}")]
    NotFound(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Binary serialization error
    #[error("binary serialization error: {0}")]
    BinarySerialization(#[from] bincode::Error),

    /// Storage error
    #[error("storage error: {0}")]
    Storage(String),

    /// Invalid checkpoint or configuration
    #[error("invalid checkpoint: {0}")]
    Invalid(String),
}
