//! Arbor Entity - Construction, initialization and handle layer
//!
//! Turns a declarative specification tree into a live, addressable object
//! graph. Creation is a two-pass protocol:
//!
//! 1. **Construction**: every node in the tree gets an implementation
//!    object and a handle, parent-linked in creation order, with no
//!    initialization logic run - so forward references between siblings and
//!    ancestors resolve by identity.
//! 2. **Initialization**: after the whole subtree's configuration is
//!    validated, each entity runs its init hook, locations, initializers,
//!    enrichers and policies, top-down, parents before children, siblings
//!    in declaration order.
//!
//! External callers only ever hold an [`EntityHandle`]; handles stay valid
//! across a rebind and enforce the node's read-only mode at the boundary.
//!
//! ## Example
//!
//! ```no_run
//! use arbor_entity::{EntityFactory, EntitySpec, ManagementContext};
//! use arbor_entity::{LocalTaskExecutor, NoOpPolicyFactory};
//! use arbor_registry::{EntityTypeDefinition, InMemoryTypeRegistry};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = InMemoryTypeRegistry::new();
//! registry.register(EntityTypeDefinition::basic("app.server"))?;
//!
//! let mgmt = Arc::new(ManagementContext::new(
//!     Arc::new(registry),
//!     Arc::new(NoOpPolicyFactory),
//!     Arc::new(LocalTaskExecutor),
//! ));
//! let factory = EntityFactory::new(mgmt);
//!
//! let spec = EntitySpec::new("app.server")
//!     .with_config("port", 8080_i64)
//!     .with_child(EntitySpec::new("app.server"));
//! let entity = factory.create_entity(spec, None).await?;
//! println!("created {}", entity.id());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod entity;
pub mod error;
pub mod factory;
pub mod handle;
pub mod init;
pub mod initializer;
pub mod location;
pub mod manager;
pub mod policy;
pub mod spec;
pub mod task;

// Re-exports
pub use entity::{EntityDynamicType, EntityNode, EntityStatus};
pub use error::{CreationError, EntityError, ResolveError, Result, TaskError};
pub use factory::EntityFactory;
pub use handle::{EntityHandle, CAPABILITY_ENTITY, CAPABILITY_GROUP};
pub use initializer::{ConfigInitializer, EntityInitializer};
pub use location::LocationManager;
pub use manager::ManagementContext;
pub use policy::{Enricher, NoOpPolicyFactory, Policy, PolicyFactory, PolicyFactoryError};
pub use spec::EntitySpec;
pub use task::{ExecutionContext, LocalTaskExecutor, Task, TaskExecutor, TaskValue};
