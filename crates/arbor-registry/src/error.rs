//! Registry error types

use thiserror::Error;

/// Registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Unknown entity type: {0}")]
    UnknownType(String),

    #[error("Type already registered: {0}")]
    AlreadyRegistered(String),
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
