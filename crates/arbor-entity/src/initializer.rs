//! Declarative entity initializers
//!
//! An initializer is a unit of setup logic applied to an entity once its
//! whole subtree exists, so it may reference descendants or siblings by
//! identity. Initializers run in declaration order; the first failure wins
//! and aborts the entity's remaining initialization steps.
//!
//! An initializer that creates entities of its own must leave them fully
//! initialized - the initialization engine will not revisit them.

use crate::error::CreationError;
use crate::handle::EntityHandle;
use crate::manager::ManagementContext;
use arbor_types::ConfigValue;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A declarative unit of setup logic applied to an entity
#[async_trait]
pub trait EntityInitializer: Send + Sync {
    /// Name used in failure messages
    fn name(&self) -> &str {
        "initializer"
    }

    /// Apply this initializer to the entity
    async fn apply(
        &self,
        entity: &EntityHandle,
        mgmt: &Arc<ManagementContext>,
    ) -> Result<(), CreationError>;
}

/// Initializer that sets configuration entries on the entity
pub struct ConfigInitializer {
    entries: BTreeMap<String, ConfigValue>,
}

impl ConfigInitializer {
    pub fn new(entries: BTreeMap<String, ConfigValue>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl EntityInitializer for ConfigInitializer {
    fn name(&self) -> &str {
        "config-initializer"
    }

    async fn apply(
        &self,
        entity: &EntityHandle,
        _mgmt: &Arc<ManagementContext>,
    ) -> Result<(), CreationError> {
        for (key, value) in &self.entries {
            entity.set_config(key.clone(), value.clone())?;
        }
        Ok(())
    }
}
