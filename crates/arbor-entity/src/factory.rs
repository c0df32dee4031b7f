//! Construction engine
//!
//! Turns a specification tree into a fully parent-linked tree of
//! implementation objects plus handles, without running any initializer,
//! policy, enricher or location-creation logic. Construction is the first of
//! two passes: the hierarchy is fully populated before any initialization,
//! so initializers can reference descendants and siblings by identity.
//!
//! Also used during rebind, when implementation objects are reconstructed
//! for identities that already have live handles.

use crate::entity::EntityNode;
use crate::error::{CreationError, Result};
use crate::handle::EntityHandle;
use crate::init;
use crate::manager::ManagementContext;
use crate::spec::EntitySpec;
use crate::task::ExecutionContext;
use arbor_types::{is_reserved_structural_key, ConfigValue, EntityId, ManagementEvent};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Identity maps scoped to one top-level creation call
///
/// Needed because initialization requires both the spec and the
/// implementation object, keyed by identity. Discarded when the call
/// returns; never shared across concurrent creation calls.
#[derive(Default)]
pub(crate) struct CreationArena {
    entities: HashMap<EntityId, Arc<EntityNode>>,
    specs: HashMap<EntityId, EntitySpec>,
}

impl CreationArena {
    fn insert(&mut self, id: EntityId, node: Arc<EntityNode>, spec: EntitySpec) {
        self.entities.insert(id.clone(), node);
        self.specs.insert(id, spec);
    }

    pub(crate) fn entity(&self, id: &EntityId) -> Option<Arc<EntityNode>> {
        self.entities.get(id).cloned()
    }

    pub(crate) fn spec(&self, id: &EntityId) -> Option<EntitySpec> {
        self.specs.get(id).cloned()
    }

    fn ids(&self) -> impl Iterator<Item = &EntityId> {
        self.entities.keys()
    }
}

/// Construction flags, applied as explicit typed field assignments
///
/// Structural relationships (parent, owner, identity) must never be encoded
/// as flags; they have dedicated spec fields.
struct ConstructionParams {
    display_name: Option<String>,
    config: Vec<(String, ConfigValue)>,
}

impl ConstructionParams {
    fn from_flags(
        flags: &std::collections::BTreeMap<String, ConfigValue>,
        spec_type: &str,
    ) -> Result<Self> {
        let mut params = Self {
            display_name: None,
            config: Vec::new(),
        };
        for (key, value) in flags {
            if is_reserved_structural_key(key) {
                return Err(CreationError::ReservedKey {
                    key: key.clone(),
                    section: "flags",
                    spec_type: spec_type.to_string(),
                });
            }
            match key.as_str() {
                "display_name" => params.display_name = value.as_str().map(str::to_string),
                _ => params.config.push((key.clone(), value.clone())),
            }
        }
        Ok(params)
    }
}

/// Creates entities (and handles) of required types from specification trees
pub struct EntityFactory {
    mgmt: Arc<ManagementContext>,
}

impl EntityFactory {
    pub fn new(mgmt: Arc<ManagementContext>) -> Self {
        Self { mgmt }
    }

    /// Create an entity tree from a spec: construct every node, validate the
    /// whole subtree's configuration, then initialize top-down
    ///
    /// On success the returned handle addresses a fully initialized entity.
    /// On failure no usable entity results; construction failures also
    /// deregister anything this call had registered.
    #[instrument(skip(self, spec), fields(spec_type = %spec.type_name))]
    pub async fn create_entity(
        &self,
        spec: EntitySpec,
        explicit_id: Option<EntityId>,
    ) -> Result<EntityHandle> {
        let ctx = ExecutionContext::new(self.mgmt.executor().clone());
        self.create_entity_in(spec, explicit_id, ctx).await
    }

    /// Like [`create_entity`](Self::create_entity), under a caller-supplied
    /// execution context (e.g. to allow cancellation)
    pub async fn create_entity_in(
        &self,
        spec: EntitySpec,
        explicit_id: Option<EntityId>,
        ctx: ExecutionContext,
    ) -> Result<EntityHandle> {
        // Two passes: hierarchy fully populated before initialization, so
        // config and initializers may reference other entities by identity.
        let mut arena = CreationArena::default();
        let root = match self.create_uninitialized_tree(&spec, explicit_id, None, &mut arena) {
            Ok(root) => root,
            Err(e) => {
                // A failed construction must not leave partial subtrees
                // addressable.
                for id in arena.ids() {
                    self.mgmt.unregister_entity(id);
                }
                return Err(e);
            }
        };

        init::init_entity_and_descendants(
            self.mgmt.clone(),
            root.id().clone(),
            Arc::new(arena),
            ctx,
        )
        .await?;

        Ok(root)
    }

    /// Construct one node and all its descendants, parent-linked and
    /// registered, with no initialization logic run
    fn create_uninitialized_tree(
        &self,
        spec: &EntitySpec,
        explicit_id: Option<EntityId>,
        parent: Option<&EntityHandle>,
        arena: &mut CreationArena,
    ) -> Result<EntityHandle> {
        for key in spec.config.keys() {
            if is_reserved_structural_key(key) {
                return Err(CreationError::ReservedKey {
                    key: key.clone(),
                    section: "config",
                    spec_type: spec.type_name.clone(),
                });
            }
        }
        let params = ConstructionParams::from_flags(&spec.flags, &spec.type_name)?;

        // 1. Resolve the implementation: explicit override wins over the
        //    registry lookup by declared type.
        let definition = match &spec.implementation {
            Some(implementation) => self.mgmt.registry().resolve(implementation)?,
            None => self.mgmt.registry().resolve(&spec.type_name)?,
        };

        // 2. Construct the implementation object and its handle.
        let id = explicit_id
            .or_else(|| spec.id.clone())
            .unwrap_or_else(EntityId::generate);
        if arena.entity(&id).is_some() {
            return Err(CreationError::DuplicateIdentity(id));
        }
        let behavior = (definition.constructor)();
        let node = Arc::new(EntityNode::new(id.clone(), behavior));

        let mut capabilities: BTreeSet<String> =
            definition.capabilities.iter().cloned().collect();
        capabilities.extend(spec.capabilities.iter().cloned());
        let handle = EntityHandle::new(node.clone(), capabilities, self.mgmt.read_only_flag());
        self.mgmt.register_entity(handle.clone());
        arena.insert(id.clone(), node.clone(), spec.clone());

        // 3. Load the uninitialized entity from the spec.
        self.load_uninitialized(&node, spec, &params, parent)?;

        debug!(entity = %id, type_name = %spec.type_name, "Entity constructed");
        self.mgmt.emit_info(ManagementEvent::EntityCreated {
            entity: id.clone(),
            type_name: spec.type_name.clone(),
        });

        // 4. Recurse into children, linking each to this node.
        for child_spec in &spec.children {
            let child = self.create_uninitialized_tree(child_spec, None, Some(&handle), arena)?;
            node.add_child(child);
        }

        // 5. Attach declared members; every referenced member must already
        //    be constructed.
        for member_id in &spec.members {
            if !node.supports_membership() {
                return Err(CreationError::NotAGroup {
                    entity: id.clone(),
                    member: member_id.clone(),
                });
            }
            let member =
                self.mgmt
                    .get_entity(member_id)
                    .ok_or_else(|| CreationError::UnknownMember {
                        entity: id.clone(),
                        member: member_id.clone(),
                    })?;
            node.add_member(member)?;
        }

        // 6. Join declared groups.
        for group_id in &spec.groups {
            let group = self
                .mgmt
                .get_entity(group_id)
                .ok_or_else(|| CreationError::UnknownGroup {
                    group: group_id.clone(),
                    entity: id.clone(),
                })?;
            group
                .node()
                .add_member(handle.clone())
                .map_err(|_| CreationError::NotAGroup {
                    entity: group_id.clone(),
                    member: id.clone(),
                })?;
        }

        Ok(handle)
    }

    /// Apply spec-supplied state to a freshly constructed node
    fn load_uninitialized(
        &self,
        node: &Arc<EntityNode>,
        spec: &EntitySpec,
        params: &ConstructionParams,
        parent: Option<&EntityHandle>,
    ) -> Result<()> {
        if let Some(name) = &spec.display_name {
            node.set_display_name(name.clone());
        }
        if let Some(name) = &params.display_name {
            node.set_display_name(name.clone());
        }
        if let Some(catalog_item_id) = &spec.catalog_item_id {
            node.set_catalog_item_id(catalog_item_id.clone());
        }
        for tag in &spec.tags {
            node.add_tag(tag.clone());
        }

        // When the spec comes from a catalog item its parameter list is
        // canonical: wipe inherited keys so the narrowed set is respected
        // exactly.
        if spec.catalog_item_id.is_some() {
            node.clear_config_keys();
        }
        for parameter in &spec.parameters {
            node.add_config_key(parameter.clone());
        }

        for (key, value) in &params.config {
            node.set_config(key.clone(), value.clone());
        }
        for (key, value) in &spec.config {
            node.set_config(key.clone(), value.clone());
        }

        // Parent is linked by handle, never by implementation object.
        match parent {
            Some(parent_handle) => {
                if let Some(declared) = &spec.parent {
                    if declared != parent_handle.id() {
                        return Err(CreationError::ParentMismatch {
                            child_type: spec.type_name.clone(),
                            declared: declared.clone(),
                            actual: parent_handle.id().clone(),
                        });
                    }
                    warn!(
                        entity = %node.id(),
                        parent = %parent_handle.id(),
                        "Child spec is already linked to its parent; how did this happen?"
                    );
                }
                node.set_parent(Some(parent_handle.clone()));
            }
            None => {
                if let Some(declared) = &spec.parent {
                    let parent_handle = self
                        .mgmt
                        .get_entity(declared)
                        .ok_or_else(|| CreationError::UnknownParent(declared.clone()))?;
                    node.set_parent(Some(parent_handle.clone()));
                    parent_handle.node().add_child(
                        self.mgmt
                            .get_entity(node.id())
                            .ok_or_else(|| CreationError::Internal(format!(
                                "handle for {} missing from live table",
                                node.id()
                            )))?,
                    );
                }
            }
        }

        Ok(())
    }

    /// Construct an implementation object for an existing identity during
    /// rebind
    ///
    /// Only new-style types can be rebound. When a live handle already
    /// exists for the identity it is reused and repointed at the successor
    /// implementation - never a second handle for the same identity.
    #[instrument(skip(self, capabilities), fields(type_name = %type_name, entity = %entity_id))]
    pub fn construct_for_rebind(
        &self,
        type_name: &str,
        capabilities: Vec<String>,
        entity_id: EntityId,
    ) -> Result<EntityHandle> {
        let definition = self.mgmt.registry().resolve(type_name)?;
        if !definition.new_style {
            return Err(CreationError::OldStyleRebind(type_name.to_string()));
        }

        let behavior = (definition.constructor)();
        let node = Arc::new(EntityNode::new(entity_id.clone(), behavior));

        match self.mgmt.get_entity(&entity_id) {
            Some(existing) => {
                existing.rebind_to(node);
                Ok(existing)
            }
            None => {
                let mut caps: BTreeSet<String> =
                    definition.capabilities.iter().cloned().collect();
                caps.extend(capabilities);
                let handle = EntityHandle::new(node, caps, self.mgmt.read_only_flag());
                self.mgmt.register_entity(handle.clone());
                Ok(handle)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityStatus;
    use crate::error::EntityError;
    use crate::handle::{CAPABILITY_ENTITY, CAPABILITY_GROUP};
    use crate::policy::NoOpPolicyFactory;
    use crate::task::LocalTaskExecutor;
    use arbor_registry::{EntityTypeDefinition, InMemoryTypeRegistry, RegistryError};
    use arbor_types::{ConfigConstraint, SpecParameter, ValueKind};

    fn context() -> Arc<ManagementContext> {
        let registry = InMemoryTypeRegistry::new();
        registry
            .register(EntityTypeDefinition::basic("app.server"))
            .unwrap();
        registry
            .register(EntityTypeDefinition::basic_group("app.cluster"))
            .unwrap();
        registry
            .register(EntityTypeDefinition::basic("app.server.hardened"))
            .unwrap();
        registry
            .register(EntityTypeDefinition::basic("legacy.server").old_style())
            .unwrap();
        Arc::new(ManagementContext::new(
            Arc::new(registry),
            Arc::new(NoOpPolicyFactory),
            Arc::new(LocalTaskExecutor),
        ))
    }

    #[tokio::test]
    async fn test_tree_construction_counts_and_parents() {
        let mgmt = context();
        let factory = EntityFactory::new(mgmt.clone());

        let spec = EntitySpec::new("app.server")
            .with_child(
                EntitySpec::new("app.server").with_child(EntitySpec::new("app.server")),
            )
            .with_child(EntitySpec::new("app.server"));

        let root = factory.create_entity(spec, None).await.unwrap();

        assert_eq!(mgmt.entity_count(), 4);
        assert_eq!(root.parent(), None);
        let children = root.children();
        assert_eq!(children.len(), 2);
        for child in &children {
            assert_eq!(child.parent().as_ref(), Some(&root));
        }
        let grandchildren = children[0].children();
        assert_eq!(grandchildren.len(), 1);
        assert_eq!(grandchildren[0].parent().as_ref(), Some(&children[0]));
        assert_eq!(root.status(), EntityStatus::Initialized);
    }

    #[tokio::test]
    async fn test_reserved_config_key_fails_before_any_creation() {
        let mgmt = context();
        let factory = EntityFactory::new(mgmt.clone());

        let spec = EntitySpec::new("app.server").with_config("parent", "x");
        let err = factory.create_entity(spec, None).await.unwrap_err();
        assert!(matches!(err, CreationError::ReservedKey { section: "config", .. }));
        assert_eq!(mgmt.entity_count(), 0);
    }

    #[tokio::test]
    async fn test_reserved_flag_key_rejected() {
        let mgmt = context();
        let factory = EntityFactory::new(mgmt.clone());

        let spec = EntitySpec::new("app.server").with_flag("id", "x");
        let err = factory.create_entity(spec, None).await.unwrap_err();
        assert!(matches!(err, CreationError::ReservedKey { section: "flags", .. }));
        assert_eq!(mgmt.entity_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_construction_deregisters_partial_subtree() {
        let mgmt = context();
        let factory = EntityFactory::new(mgmt.clone());

        // Root constructs fine; the second child carries a reserved key.
        let spec = EntitySpec::new("app.server")
            .with_child(EntitySpec::new("app.server"))
            .with_child(EntitySpec::new("app.server").with_config("owner", "x"));

        assert!(factory.create_entity(spec, None).await.is_err());
        assert_eq!(mgmt.entity_count(), 0);
    }

    #[tokio::test]
    async fn test_parent_mismatch_is_structural_error() {
        let mgmt = context();
        let factory = EntityFactory::new(mgmt.clone());

        let spec = EntitySpec::new("app.server")
            .with_id(EntityId::new("root"))
            .with_child(
                EntitySpec::new("app.server").with_parent(EntityId::new("someone-else")),
            );

        let err = factory.create_entity(spec, None).await.unwrap_err();
        assert!(matches!(err, CreationError::ParentMismatch { .. }));
    }

    #[tokio::test]
    async fn test_pre_linked_child_parent_is_tolerated() {
        let mgmt = context();
        let factory = EntityFactory::new(mgmt.clone());

        let spec = EntitySpec::new("app.server")
            .with_id(EntityId::new("root"))
            .with_child(EntitySpec::new("app.server").with_parent(EntityId::new("root")));

        let root = factory.create_entity(spec, None).await.unwrap();
        assert_eq!(root.children().len(), 1);
    }

    #[tokio::test]
    async fn test_handles_for_same_identity_are_equal() {
        let mgmt = context();
        let factory = EntityFactory::new(mgmt.clone());

        let id = EntityId::new("server-1");
        let created = factory
            .create_entity(EntitySpec::new("app.server"), Some(id.clone()))
            .await
            .unwrap();
        let looked_up = mgmt.get_entity(&id).unwrap();

        assert_eq!(created, looked_up);

        // Both forward to the same live implementation.
        looked_up
            .set_config("port", ConfigValue::Int(9090))
            .unwrap();
        assert_eq!(created.config_value("port"), Some(ConfigValue::Int(9090)));
    }

    #[tokio::test]
    async fn test_capabilities_on_handle() {
        let mgmt = context();
        let factory = EntityFactory::new(mgmt.clone());

        let server = factory
            .create_entity(
                EntitySpec::new("app.server").with_capability("startable"),
                None,
            )
            .await
            .unwrap();
        assert!(server.supports(CAPABILITY_ENTITY));
        assert!(server.supports("startable"));
        assert!(!server.supports(CAPABILITY_GROUP));

        let cluster = factory
            .create_entity(EntitySpec::new("app.cluster"), None)
            .await
            .unwrap();
        assert!(cluster.supports(CAPABILITY_GROUP));
    }

    #[tokio::test]
    async fn test_membership_requires_group_type() {
        let mgmt = context();
        let factory = EntityFactory::new(mgmt.clone());

        let member = factory
            .create_entity(EntitySpec::new("app.server"), Some(EntityId::new("m1")))
            .await
            .unwrap();

        // A non-group with declared members is a structural error.
        let err = factory
            .create_entity(
                EntitySpec::new("app.server").with_member(member.id().clone()),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CreationError::NotAGroup { .. }));

        // A group accepts the member.
        let group = factory
            .create_entity(
                EntitySpec::new("app.cluster").with_member(member.id().clone()),
                None,
            )
            .await
            .unwrap();
        assert_eq!(group.members(), vec![member]);
    }

    #[tokio::test]
    async fn test_member_must_already_be_constructed() {
        let mgmt = context();
        let factory = EntityFactory::new(mgmt.clone());

        let err = factory
            .create_entity(
                EntitySpec::new("app.cluster").with_member(EntityId::new("not-yet")),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CreationError::UnknownMember { .. }));
    }

    #[tokio::test]
    async fn test_joining_declared_groups() {
        let mgmt = context();
        let factory = EntityFactory::new(mgmt.clone());

        let group = factory
            .create_entity(EntitySpec::new("app.cluster"), Some(EntityId::new("g1")))
            .await
            .unwrap();

        let member = factory
            .create_entity(
                EntitySpec::new("app.server").with_group(group.id().clone()),
                None,
            )
            .await
            .unwrap();

        assert_eq!(group.members(), vec![member]);
    }

    #[tokio::test]
    async fn test_implementation_override_wins_over_declared_type() {
        let mgmt = context();
        let factory = EntityFactory::new(mgmt.clone());

        let entity = factory
            .create_entity(
                EntitySpec::new("app.server").with_implementation("app.server.hardened"),
                None,
            )
            .await
            .unwrap();
        assert_eq!(entity.type_name(), "app.server.hardened");
    }

    #[tokio::test]
    async fn test_unknown_type_fails() {
        let mgmt = context();
        let factory = EntityFactory::new(mgmt.clone());

        let err = factory
            .create_entity(EntitySpec::new("no.such.type"), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CreationError::Registry(RegistryError::UnknownType(_))
        ));
    }

    #[tokio::test]
    async fn test_root_under_existing_parent() {
        let mgmt = context();
        let factory = EntityFactory::new(mgmt.clone());

        let parent = factory
            .create_entity(EntitySpec::new("app.server"), Some(EntityId::new("p1")))
            .await
            .unwrap();

        let child = factory
            .create_entity(
                EntitySpec::new("app.server").with_parent(parent.id().clone()),
                None,
            )
            .await
            .unwrap();

        assert_eq!(child.parent(), Some(parent.clone()));
        assert_eq!(parent.children(), vec![child]);
    }

    #[tokio::test]
    async fn test_flags_become_typed_fields_and_config() {
        let mgmt = context();
        let factory = EntityFactory::new(mgmt.clone());

        let entity = factory
            .create_entity(
                EntitySpec::new("app.server")
                    .with_flag("display_name", "Web Tier")
                    .with_flag("install.dir", "/opt/web"),
                None,
            )
            .await
            .unwrap();

        assert_eq!(entity.display_name(), Some("Web Tier".to_string()));
        assert_eq!(
            entity.config_value("install.dir"),
            Some(ConfigValue::from("/opt/web"))
        );
    }

    #[tokio::test]
    async fn test_spec_parameters_and_tags_applied() {
        let mgmt = context();
        let factory = EntityFactory::new(mgmt.clone());

        let entity = factory
            .create_entity(
                EntitySpec::new("app.server")
                    .with_tag("tier:web")
                    .with_parameter(
                        SpecParameter::new("region", ValueKind::String)
                            .with_default("us-east")
                            .with_constraint(ConfigConstraint::Required),
                    ),
                None,
            )
            .await
            .unwrap();

        assert_eq!(entity.tags(), vec!["tier:web".to_string()]);
        assert_eq!(
            entity.config_value("region"),
            Some(ConfigValue::from("us-east"))
        );
    }

    #[tokio::test]
    async fn test_read_only_mode_blocks_mutation_at_handle() {
        let mgmt = context();
        let factory = EntityFactory::new(mgmt.clone());

        let entity = factory
            .create_entity(EntitySpec::new("app.server"), None)
            .await
            .unwrap();

        mgmt.set_read_only(true);
        let err = entity.set_config("port", ConfigValue::Int(1)).unwrap_err();
        assert!(matches!(err, EntityError::ReadOnlyMode { .. }));
        assert_eq!(entity.config_value("port"), None);

        // Reads still work in read-only mode.
        assert_eq!(entity.type_name(), "app.server");

        mgmt.set_read_only(false);
        entity.set_config("port", ConfigValue::Int(1)).unwrap();
    }

    #[tokio::test]
    async fn test_rebind_reuses_existing_handle() {
        let mgmt = context();
        let factory = EntityFactory::new(mgmt.clone());

        let id = EntityId::new("survivor");
        let original = factory
            .create_entity(EntitySpec::new("app.server"), Some(id.clone()))
            .await
            .unwrap();
        assert_eq!(original.status(), EntityStatus::Initialized);

        // Simulated restart: a successor implementation is constructed for
        // the same identity; the live handle is reused and repointed.
        let rebound = factory
            .construct_for_rebind("app.server", Vec::new(), id.clone())
            .unwrap();

        assert_eq!(rebound, original);
        assert_eq!(original.status(), EntityStatus::Constructed);
        assert_eq!(mgmt.entity_count(), 1);
    }

    #[tokio::test]
    async fn test_rebind_without_live_handle_creates_one() {
        let mgmt = context();
        let factory = EntityFactory::new(mgmt.clone());

        let id = EntityId::new("from-store");
        let handle = factory
            .construct_for_rebind("app.server", vec!["startable".into()], id.clone())
            .unwrap();
        assert!(handle.supports("startable"));
        assert_eq!(mgmt.get_entity(&id), Some(handle));
    }

    #[tokio::test]
    async fn test_rebind_rejects_old_style_types() {
        let mgmt = context();
        let factory = EntityFactory::new(mgmt.clone());

        let err = factory
            .construct_for_rebind("legacy.server", Vec::new(), EntityId::new("x"))
            .unwrap_err();
        assert!(matches!(err, CreationError::OldStyleRebind(_)));
    }
}
