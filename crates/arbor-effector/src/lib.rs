//! Arbor Effector - Shell-command effectors
//!
//! A [`CmdEffector`] is a declared, invocable operation on an entity that
//! runs a command template remotely. Invocation composes a layered shell
//! environment (declared parameters, the entity's own environment, the
//! effector's environment, call-time arguments), deeply resolves deferred
//! values, serializes everything to string pairs, and submits the command
//! through the remote-execution boundary, requiring a zero exit status and
//! returning captured stdout.
//!
//! Transport mechanics live behind [`RemoteExecutor`]; this crate only
//! composes and submits.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod command;
pub mod env;
pub mod error;
pub mod remote;

// Re-exports
pub use command::{CmdEffector, EffectorParameter, UnresolvedValuePolicy, SHELL_ENVIRONMENT_KEY};
pub use env::{make_command_executing_in_dir, ShellEnvironmentSerializer};
pub use error::{EffectorError, Result};
pub use remote::{CommandOutcome, CommandRequest, RemoteExecutor};
