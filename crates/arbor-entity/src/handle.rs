//! Entity handles
//!
//! A handle is the only valid external reference to an entity. It forwards
//! every operation to the current implementation object, compares equal to
//! any other handle for the same identity, and keeps resolving after the
//! implementation object is replaced during a rebind.
//!
//! Mutating operations are refused at this boundary while the owning
//! management node is in read-only (standby) mode; they never reach the
//! implementation object.

use crate::entity::{EntityNode, EntityStatus};
use crate::error::EntityError;
use crate::policy::{Enricher, Policy};
use arbor_types::{ConfigValue, EntityId, Location};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// Universal capability exposed by every entity
pub const CAPABILITY_ENTITY: &str = "entity";

/// Capability exposed by entities whose type supports membership
pub const CAPABILITY_GROUP: &str = "group";

struct HandleShared {
    id: EntityId,
    capabilities: BTreeSet<String>,
    node: RwLock<Arc<EntityNode>>,
    read_only: Arc<AtomicBool>,
}

/// Stable, capability-typed reference to an entity
#[derive(Clone)]
pub struct EntityHandle {
    shared: Arc<HandleShared>,
}

impl EntityHandle {
    pub(crate) fn new(
        node: Arc<EntityNode>,
        mut capabilities: BTreeSet<String>,
        read_only: Arc<AtomicBool>,
    ) -> Self {
        capabilities.insert(CAPABILITY_ENTITY.to_string());
        if node.supports_membership() {
            capabilities.insert(CAPABILITY_GROUP.to_string());
        }
        Self {
            shared: Arc::new(HandleShared {
                id: node.id().clone(),
                capabilities,
                node: RwLock::new(node),
                read_only,
            }),
        }
    }

    pub fn id(&self) -> &EntityId {
        &self.shared.id
    }

    /// Whether the handle exposes the given capability interface
    pub fn supports(&self, capability: &str) -> bool {
        self.shared.capabilities.contains(capability)
    }

    pub fn capabilities(&self) -> Vec<String> {
        self.shared.capabilities.iter().cloned().collect()
    }

    /// The current implementation object
    pub(crate) fn node(&self) -> Arc<EntityNode> {
        self.shared
            .node
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Repoint this handle at a successor implementation object
    ///
    /// Used during rebind; the identity must not change.
    pub(crate) fn rebind_to(&self, node: Arc<EntityNode>) {
        debug_assert_eq!(node.id(), &self.shared.id);
        *self.shared.node.write().unwrap_or_else(|e| e.into_inner()) = node;
    }

    fn guard_mutation(&self, operation: &str) -> Result<(), EntityError> {
        if self.shared.read_only.load(Ordering::SeqCst) {
            return Err(EntityError::ReadOnlyMode {
                operation: operation.to_string(),
            });
        }
        Ok(())
    }

    // ========== Read operations ==========

    pub fn type_name(&self) -> String {
        self.node().type_name()
    }

    pub fn status(&self) -> EntityStatus {
        self.node().status()
    }

    pub fn display_name(&self) -> Option<String> {
        self.node().display_name()
    }

    pub fn catalog_item_id(&self) -> Option<String> {
        self.node().catalog_item_id()
    }

    pub fn parent(&self) -> Option<EntityHandle> {
        self.node().parent()
    }

    pub fn children(&self) -> Vec<EntityHandle> {
        self.node().children()
    }

    pub fn members(&self) -> Vec<EntityHandle> {
        self.node().members()
    }

    pub fn config_value(&self, key: &str) -> Option<ConfigValue> {
        self.node().config_value(key)
    }

    pub fn locations(&self) -> Vec<Location> {
        self.node().locations()
    }

    pub fn tags(&self) -> Vec<String> {
        self.node().tags()
    }

    pub fn sensors(&self) -> Vec<String> {
        self.node().sensors()
    }

    pub fn enrichers(&self) -> Vec<Arc<dyn Enricher>> {
        self.node().enrichers()
    }

    pub fn policies(&self) -> Vec<Arc<dyn Policy>> {
        self.node().policies()
    }

    // ========== Mutating operations ==========

    pub fn set_config(
        &self,
        key: impl Into<String>,
        value: ConfigValue,
    ) -> Result<(), EntityError> {
        self.guard_mutation("set_config")?;
        self.node().set_config(key, value);
        Ok(())
    }

    pub fn set_display_name(&self, name: impl Into<String>) -> Result<(), EntityError> {
        self.guard_mutation("set_display_name")?;
        self.node().set_display_name(name);
        Ok(())
    }

    pub fn add_tag(&self, tag: impl Into<String>) -> Result<(), EntityError> {
        self.guard_mutation("add_tag")?;
        self.node().add_tag(tag);
        Ok(())
    }

    pub fn add_sensor(&self, name: impl Into<String>) -> Result<(), EntityError> {
        self.guard_mutation("add_sensor")?;
        self.node().add_sensor(name);
        Ok(())
    }

    /// Attach an already-initialized entity as a child of this one
    pub fn attach_child(&self, child: EntityHandle) -> Result<(), EntityError> {
        self.guard_mutation("attach_child")?;
        child.node().set_parent(Some(self.clone()));
        self.node().add_child(child);
        Ok(())
    }

    /// Add a member; the entity's type must support membership
    pub fn add_member(&self, member: EntityHandle) -> Result<(), EntityError> {
        self.guard_mutation("add_member")?;
        self.node().add_member(member)
    }
}

impl PartialEq for EntityHandle {
    fn eq(&self, other: &Self) -> bool {
        self.shared.id == other.shared.id
    }
}

impl Eq for EntityHandle {}

impl std::hash::Hash for EntityHandle {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.shared.id.hash(state);
    }
}

impl std::fmt::Debug for EntityHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityHandle")
            .field("id", &self.shared.id)
            .field("capabilities", &self.shared.capabilities)
            .finish()
    }
}
