//! Effector error types

use arbor_entity::{ResolveError, TaskError};
use thiserror::Error;

/// Effector errors
#[derive(Debug, Error)]
pub enum EffectorError {
    /// A deferred environment value failed to resolve and the effector's
    /// policy requires resolution to succeed
    #[error("Failed to resolve environment value for key `{key}`: {source}")]
    Resolution {
        key: String,
        #[source]
        source: ResolveError,
    },

    /// The remote command exited non-zero
    #[error("Effector `{effector}` command failed with exit status {exit_status}: {stderr}")]
    CommandFailed {
        effector: String,
        exit_status: i32,
        stderr: String,
    },

    /// The remote-execution collaborator faulted before an exit status was
    /// available
    #[error("Remote execution fault: {0}")]
    Transport(String),

    /// The task boundary reported a failure with no typed cause
    #[error("Task error: {0}")]
    Task(#[from] TaskError),
}

/// Result type for effector operations
pub type Result<T> = std::result::Result<T, EffectorError>;
