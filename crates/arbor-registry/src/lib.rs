//! Arbor Registry - Entity type registry
//!
//! Maps a declared type name to a concrete implementation: a constructor for
//! the type's behavior object plus the capability interfaces the type
//! exposes. The mapping is explicit - types are registered programmatically,
//! and resolution is a plain lookup with no reflection involved.
//!
//! ## In-Memory vs Persistent
//!
//! The crate provides an in-memory implementation suitable for embedding and
//! testing. A catalog-backed registry would implement the same trait.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod behavior;
pub mod error;
pub mod types;

// Re-exports
pub use behavior::{BasicEntityBehavior, EntityBehavior, InitHookError};
pub use error::{RegistryError, Result};
pub use types::{BehaviorConstructor, EntityTypeDefinition, EntityTypeRegistry, InMemoryTypeRegistry};
