//! Error types for construction, initialization and handle operations

use arbor_registry::{InitHookError, RegistryError};
use arbor_types::{ConfigConstraint, EntityId};
use thiserror::Error;

/// Errors raised by handle operations
#[derive(Debug, Error)]
pub enum EntityError {
    /// Mutating operation attempted while the management node is read-only
    #[error("Operation `{operation}` not permitted in read-only mode")]
    ReadOnlyMode { operation: String },

    /// Membership operation on an entity that is not a group
    #[error("Entity {0} is not a group")]
    NotAGroup(EntityId),
}

/// Errors raised while creating or initializing an entity tree
#[derive(Debug, Error)]
pub enum CreationError {
    /// A reserved structural key appeared in generic configuration
    #[error(
        "Reserved structural key `{key}` must not appear in the {section} of a spec \
         for type {spec_type}; use the dedicated spec field instead"
    )]
    ReservedKey {
        key: String,
        section: &'static str,
        spec_type: String,
    },

    /// Type resolution failed
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// A child spec declares a parent other than the node constructing it
    #[error(
        "Child spec of type {child_type} declares parent {declared}, \
         but is being constructed as a child of {actual}"
    )]
    ParentMismatch {
        child_type: String,
        declared: EntityId,
        actual: EntityId,
    },

    /// A root spec declares a parent that is not a live entity
    #[error("Unknown parent {0} declared on spec")]
    UnknownParent(EntityId),

    /// Membership declared on an entity whose type does not support it
    #[error("Entity {entity} must be a group to hold member {member}")]
    NotAGroup { entity: EntityId, member: EntityId },

    /// A declared member is not constructed yet
    #[error("Member {member} referenced by spec for {entity} is not constructed")]
    UnknownMember { entity: EntityId, member: EntityId },

    /// A declared group is not a live entity
    #[error("Unknown group {group} referenced by spec for {entity}")]
    UnknownGroup { group: EntityId, entity: EntityId },

    /// A configuration constraint failed during the validation pass
    #[error("Config constraint violated on entity {entity}: key `{key}` must be {constraint}")]
    ConstraintViolation {
        entity: EntityId,
        key: String,
        constraint: ConfigConstraint,
    },

    /// The entity's own initialization hook failed
    #[error("Init hook failed for entity {entity}: {source}")]
    InitHook {
        entity: EntityId,
        source: InitHookError,
    },

    /// A declared initializer failed
    #[error("Initializer `{initializer}` failed for entity {entity}: {source}")]
    Initializer {
        entity: EntityId,
        initializer: String,
        #[source]
        source: Box<CreationError>,
    },

    /// The policy factory failed to create an enricher
    #[error("Failed to create enricher `{kind}` for entity {entity}: {source}")]
    Enricher {
        entity: EntityId,
        kind: String,
        #[source]
        source: crate::policy::PolicyFactoryError,
    },

    /// The policy factory failed to create a policy
    #[error("Failed to create policy `{kind}` for entity {entity}: {source}")]
    Policy {
        entity: EntityId,
        kind: String,
        #[source]
        source: crate::policy::PolicyFactoryError,
    },

    /// The same identity was constructed twice within one creation call
    #[error("Identity {0} constructed twice within one creation call")]
    DuplicateIdentity(EntityId),

    /// Rebind requested for a type that is not constructible new-style
    #[error("Cannot rebind old-style entity type {0}")]
    OldStyleRebind(String),

    /// The enclosing execution context was cancelled
    #[error("Creation was cancelled")]
    Cancelled,

    /// The task boundary reported a failure with no typed cause
    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    /// Handle-level failure during creation or an initializer
    #[error(transparent)]
    Entity(#[from] EntityError),

    /// Internal invariant failure
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for creation and initialization
pub type Result<T> = std::result::Result<T, CreationError>;

/// Errors raised by the task-execution boundary
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Task `{task}` failed: {message}")]
    Failed { task: String, message: String },

    #[error("Task `{task}` panicked")]
    Panicked { task: String },

    #[error("Task was cancelled")]
    Cancelled,
}

/// Errors raised while resolving deferred configuration values
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Unknown entity {0} in reference")]
    UnknownEntity(EntityId),

    #[error("Entity {entity} has no value for referenced key `{key}`")]
    UnresolvedKey { entity: EntityId, key: String },

    #[error("Reference resolution exceeded depth limit")]
    DepthExceeded,
}
