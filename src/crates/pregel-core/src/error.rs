//! Error types for graph construction and execution
//!
//! Construction problems are reported eagerly by
//! [`PregelBuilder::build`](crate::pregel::PregelBuilder::build); everything
//! else surfaces from `invoke`/`batch`/`stream`. All execution errors leave
//! the last successfully committed checkpoint unchanged, so a caller may
//! retry with the same thread id.

use pregel_checkpoint::CheckpointError;
use thiserror::Error;

/// Convenience result type using [`GraphError`]
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors raised while building or running a graph
#[derive(Error, Debug)]
pub enum GraphError {
    /// Graph structure is invalid; reported at build time
    #[error("graph validation failed: {0}")]
    Validation(String),

    /// Run configuration is invalid or incomplete
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A channel rejected the writes it received this step; the step
    /// committed nothing
    #[error("invalid channel update: {0}")]
    InvalidUpdate(String),

    /// Step budget reached without a natural halt
    #[error("recursion limit of {limit} reached without hitting a stop condition")]
    RecursionExceeded { limit: usize },

    /// A node callable failed; the step committed nothing
    #[error("node '{node}' execution failed: {error}")]
    NodeExecution { node: String, error: String },

    /// General execution failure without a specific node
    #[error("execution failed: {0}")]
    Execution(String),

    /// Checkpoint persistence or channel state error
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// JSON serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GraphError {
    /// Create a node execution error with context
    pub fn node_execution(node: impl Into<String>, error: impl Into<String>) -> Self {
        Self::NodeExecution {
            node: node.into(),
            error: error.into(),
        }
    }

    /// Map a channel update failure, keeping invalid updates distinguishable
    /// from storage-level checkpoint errors
    pub(crate) fn channel_update(channel: &str, err: CheckpointError) -> Self {
        match err {
            CheckpointError::InvalidUpdate(message) => {
                Self::InvalidUpdate(format!("channel '{channel}': {message}"))
            }
            other => Self::Checkpoint(other),
        }
    }
}
