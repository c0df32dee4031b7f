//! Remote-command boundary
//!
//! The effector hands a fully composed command plus a serialized environment
//! to an external remote-execution collaborator. The contract is narrow:
//! execute, report the exit status and captured output, or fault.

use crate::error::EffectorError;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// A composed command ready for remote execution
#[derive(Clone, Debug)]
pub struct CommandRequest {
    /// The command line to run
    pub command: String,

    /// Serialized environment variables
    pub env: BTreeMap<String, String>,

    /// Human-readable summary, e.g. `effector deploy`
    pub summary: String,
}

/// Result of a remote command execution
#[derive(Clone, Debug)]
pub struct CommandOutcome {
    /// Process exit status
    pub exit_status: i32,

    /// Captured standard output
    pub stdout: String,

    /// Captured standard error
    pub stderr: String,
}

impl CommandOutcome {
    /// A successful outcome with the given stdout
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_status: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed outcome with the given exit status and stderr
    pub fn failure(exit_status: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_status,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// External remote-execution collaborator
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Execute the command, returning its outcome or a transport fault
    async fn execute(&self, request: CommandRequest) -> Result<CommandOutcome, EffectorError>;
}
