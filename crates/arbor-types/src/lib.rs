//! Arbor Types - Core types for blueprint-driven entity management
//!
//! Arbor turns a declarative blueprint (a tree of [`spec`] descriptors) into a
//! live, addressable object graph. This crate holds the data layer shared by
//! the rest of the workspace:
//!
//! - **Identifiers**: stable string identities that survive a process restart
//! - **Configuration**: typed values, declared parameters, constraints
//! - **Descriptors**: location, enricher and policy specifications
//! - **Events**: the unified management event stream
//!
//! ## Architectural Boundaries
//!
//! - `arbor-types` owns: pure data, no behavior beyond validation helpers
//! - `arbor-registry` owns: the declared-type to implementation mapping
//! - `arbor-entity` owns: construction, initialization, handles

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod config;
pub mod events;
pub mod ids;
pub mod location;
pub mod spec;

// Re-exports
pub use config::{
    is_reserved_structural_key, ConfigConstraint, ConfigValue, SpecParameter, ValueKind,
    RESERVED_STRUCTURAL_KEYS,
};
pub use events::{EventEnvelope, EventSeverity, ManagementEvent};
pub use ids::{EntityId, LocationId};
pub use location::Location;
pub use spec::{EnricherSpec, LocationSpec, PolicySpec};
