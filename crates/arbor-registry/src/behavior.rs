//! Entity behavior trait
//!
//! A behavior object carries the type-specific logic of an entity: its
//! initialization hook and the capability interfaces it exposes. One
//! behavior instance is constructed per entity, so a behavior may hold
//! internal state of its own.

use thiserror::Error;

/// Failure raised by a behavior's initialization hook
#[derive(Debug, Error)]
#[error("init hook failed: {message}")]
pub struct InitHookError {
    pub message: String,
}

impl InitHookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Type-specific behavior of an entity
pub trait EntityBehavior: Send + Sync {
    /// The concrete type name this behavior implements
    fn type_name(&self) -> &str;

    /// Capability interfaces exposed by this type, beyond the universal
    /// entity capability
    fn capabilities(&self) -> Vec<String> {
        Vec::new()
    }

    /// Whether entities of this type can hold members
    fn supports_membership(&self) -> bool {
        false
    }

    /// Initialization hook, run before any declared initializer
    ///
    /// Takes no parameters; purely internal setup.
    fn init(&self) -> std::result::Result<(), InitHookError> {
        Ok(())
    }
}

/// Minimal behavior for types with no logic of their own
pub struct BasicEntityBehavior {
    type_name: String,
    group: bool,
}

impl BasicEntityBehavior {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            group: false,
        }
    }

    /// A basic behavior whose entities can hold members
    pub fn group(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            group: true,
        }
    }
}

impl EntityBehavior for BasicEntityBehavior {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn supports_membership(&self) -> bool {
        self.group
    }
}
