//! Entity implementation objects
//!
//! An [`EntityNode`] is the live implementation object behind a handle. It is
//! exclusively owned by the construction/initialization engine until fully
//! initialized; afterwards mutation happens through handles, serialized by
//! the interior locks here. Callers outside this crate never hold an
//! `EntityNode` directly - the handle is the only valid external reference.

use crate::error::{CreationError, EntityError};
use crate::handle::EntityHandle;
use crate::policy::{Enricher, Policy};
use arbor_registry::EntityBehavior;
use arbor_types::{ConfigValue, EntityId, Location, SpecParameter};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Lifecycle status of an implementation object
#[derive(Clone, Debug, PartialEq)]
pub enum EntityStatus {
    /// Constructed and parent-linked, no initialization logic run yet
    Constructed,

    /// The entity's own initialization steps are running
    Initializing,

    /// The entity's own initialization steps completed
    Initialized,

    /// Initialization failed partway through
    Failed { reason: String },
}

/// Declared configuration keys and sensors of an entity
///
/// Starts from the type's declaration and is narrowed or extended by the
/// spec's parameters at construction time.
#[derive(Default)]
pub struct EntityDynamicType {
    config_keys: BTreeMap<String, SpecParameter>,
    sensors: BTreeSet<String>,
}

impl EntityDynamicType {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every declared config key
    ///
    /// Used when a spec originates from a catalog item, whose parameter list
    /// is canonical and replaces anything inherited.
    pub fn clear_config_keys(&mut self) {
        self.config_keys.clear();
    }

    /// Declare a config key; a sensor binding on the parameter also
    /// registers a sensor of that name
    pub fn add_config_key(&mut self, parameter: SpecParameter) {
        if let Some(sensor) = &parameter.sensor {
            self.sensors.insert(sensor.clone());
        }
        self.config_keys.insert(parameter.name.clone(), parameter);
    }

    pub fn add_sensor(&mut self, name: impl Into<String>) {
        self.sensors.insert(name.into());
    }

    pub fn config_key(&self, name: &str) -> Option<&SpecParameter> {
        self.config_keys.get(name)
    }

    pub fn config_keys(&self) -> impl Iterator<Item = &SpecParameter> {
        self.config_keys.values()
    }

    pub fn sensors(&self) -> Vec<String> {
        self.sensors.iter().cloned().collect()
    }
}

struct EntityState {
    display_name: Option<String>,
    catalog_item_id: Option<String>,
    tags: Vec<String>,
    parent: Option<EntityHandle>,
    children: Vec<EntityHandle>,
    members: Vec<EntityHandle>,
    locations: Vec<Location>,
    config: BTreeMap<String, ConfigValue>,
    enrichers: Vec<Arc<dyn Enricher>>,
    policies: Vec<Arc<dyn Policy>>,
    status: EntityStatus,
}

/// A live implementation object
pub struct EntityNode {
    id: EntityId,
    behavior: Arc<dyn EntityBehavior>,
    dynamic_type: RwLock<EntityDynamicType>,
    state: RwLock<EntityState>,
}

impl EntityNode {
    pub(crate) fn new(id: EntityId, behavior: Arc<dyn EntityBehavior>) -> Self {
        Self {
            id,
            behavior,
            dynamic_type: RwLock::new(EntityDynamicType::new()),
            state: RwLock::new(EntityState {
                display_name: None,
                catalog_item_id: None,
                tags: Vec::new(),
                parent: None,
                children: Vec::new(),
                members: Vec::new(),
                locations: Vec::new(),
                config: BTreeMap::new(),
                enrichers: Vec::new(),
                policies: Vec::new(),
                status: EntityStatus::Constructed,
            }),
        }
    }

    fn state(&self) -> RwLockReadGuard<'_, EntityState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn state_mut(&self) -> RwLockWriteGuard<'_, EntityState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn dynamic_type(&self) -> RwLockReadGuard<'_, EntityDynamicType> {
        self.dynamic_type.read().unwrap_or_else(|e| e.into_inner())
    }

    fn dynamic_type_mut(&self) -> RwLockWriteGuard<'_, EntityDynamicType> {
        self.dynamic_type.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn type_name(&self) -> String {
        self.behavior.type_name().to_string()
    }

    pub(crate) fn behavior(&self) -> &Arc<dyn EntityBehavior> {
        &self.behavior
    }

    pub fn supports_membership(&self) -> bool {
        self.behavior.supports_membership()
    }

    pub fn status(&self) -> EntityStatus {
        self.state().status.clone()
    }

    pub(crate) fn set_status(&self, status: EntityStatus) {
        self.state_mut().status = status;
    }

    pub fn display_name(&self) -> Option<String> {
        self.state().display_name.clone()
    }

    pub(crate) fn set_display_name(&self, name: impl Into<String>) {
        self.state_mut().display_name = Some(name.into());
    }

    pub fn catalog_item_id(&self) -> Option<String> {
        self.state().catalog_item_id.clone()
    }

    pub(crate) fn set_catalog_item_id(&self, id: impl Into<String>) {
        self.state_mut().catalog_item_id = Some(id.into());
    }

    pub fn tags(&self) -> Vec<String> {
        self.state().tags.clone()
    }

    pub(crate) fn add_tag(&self, tag: impl Into<String>) {
        self.state_mut().tags.push(tag.into());
    }

    pub fn parent(&self) -> Option<EntityHandle> {
        self.state().parent.clone()
    }

    pub(crate) fn set_parent(&self, parent: Option<EntityHandle>) {
        self.state_mut().parent = parent;
    }

    /// Children, in creation order
    pub fn children(&self) -> Vec<EntityHandle> {
        self.state().children.clone()
    }

    pub(crate) fn add_child(&self, child: EntityHandle) {
        self.state_mut().children.push(child);
    }

    pub fn members(&self) -> Vec<EntityHandle> {
        self.state().members.clone()
    }

    pub(crate) fn add_member(&self, member: EntityHandle) -> Result<(), EntityError> {
        if !self.supports_membership() {
            return Err(EntityError::NotAGroup(self.id.clone()));
        }
        self.state_mut().members.push(member);
        Ok(())
    }

    pub fn locations(&self) -> Vec<Location> {
        self.state().locations.clone()
    }

    pub(crate) fn add_location(&self, location: Location) {
        self.state_mut().locations.push(location);
    }

    /// Effective value for a key: the explicit setting if any, else the
    /// declared default
    pub fn config_value(&self, key: &str) -> Option<ConfigValue> {
        if let Some(value) = self.state().config.get(key) {
            return Some(value.clone());
        }
        self.dynamic_type()
            .config_key(key)
            .and_then(|k| k.default.clone())
    }

    pub(crate) fn set_config(&self, key: impl Into<String>, value: ConfigValue) {
        self.state_mut().config.insert(key.into(), value);
    }

    pub fn sensors(&self) -> Vec<String> {
        self.dynamic_type().sensors()
    }

    pub(crate) fn add_sensor(&self, name: impl Into<String>) {
        self.dynamic_type_mut().add_sensor(name);
    }

    pub(crate) fn clear_config_keys(&self) {
        self.dynamic_type_mut().clear_config_keys();
    }

    pub(crate) fn add_config_key(&self, parameter: SpecParameter) {
        self.dynamic_type_mut().add_config_key(parameter);
    }

    pub fn enrichers(&self) -> Vec<Arc<dyn Enricher>> {
        self.state().enrichers.clone()
    }

    pub(crate) fn attach_enricher(&self, enricher: Arc<dyn Enricher>) {
        self.state_mut().enrichers.push(enricher);
    }

    pub fn policies(&self) -> Vec<Arc<dyn Policy>> {
        self.state().policies.clone()
    }

    pub(crate) fn attach_policy(&self, policy: Arc<dyn Policy>) {
        self.state_mut().policies.push(policy);
    }

    /// Assert every declared constraint against the effective config
    pub(crate) fn assert_config_valid(&self) -> Result<(), CreationError> {
        // Key defs are copied out so config_value can retake the lock.
        let keys: Vec<SpecParameter> = self.dynamic_type().config_keys().cloned().collect();
        for key in &keys {
            let value = self.config_value(&key.name);
            for constraint in &key.constraints {
                if !constraint.check(value.as_ref()) {
                    return Err(CreationError::ConstraintViolation {
                        entity: self.id.clone(),
                        key: key.name.clone(),
                        constraint: constraint.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for EntityNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityNode")
            .field("id", &self.id)
            .field("type_name", &self.behavior.type_name())
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_registry::BasicEntityBehavior;
    use arbor_types::{ConfigConstraint, ValueKind};

    fn node(id: &str) -> EntityNode {
        EntityNode::new(
            EntityId::new(id),
            Arc::new(BasicEntityBehavior::new("app.server")),
        )
    }

    #[test]
    fn test_config_default_fallback() {
        let n = node("e1");
        n.add_config_key(SpecParameter::new("port", ValueKind::Int).with_default(8080_i64));

        assert_eq!(n.config_value("port"), Some(ConfigValue::Int(8080)));

        n.set_config("port", ConfigValue::Int(9090));
        assert_eq!(n.config_value("port"), Some(ConfigValue::Int(9090)));
    }

    #[test]
    fn test_constraint_violation_reports_context() {
        let n = node("e1");
        n.add_config_key(
            SpecParameter::new("region", ValueKind::String)
                .with_constraint(ConfigConstraint::Required),
        );

        let err = n.assert_config_valid().unwrap_err();
        match err {
            CreationError::ConstraintViolation { entity, key, constraint } => {
                assert_eq!(entity, EntityId::new("e1"));
                assert_eq!(key, "region");
                assert_eq!(constraint, ConfigConstraint::Required);
            }
            other => panic!("unexpected error: {other}"),
        }

        n.set_config("region", ConfigValue::from("us-east"));
        assert!(n.assert_config_valid().is_ok());
    }

    #[test]
    fn test_membership_requires_group() {
        let plain = node("e1");
        let group = EntityNode::new(
            EntityId::new("g1"),
            Arc::new(BasicEntityBehavior::group("app.cluster")),
        );
        assert!(!plain.supports_membership());
        assert!(group.supports_membership());
    }

    #[test]
    fn test_parameter_sensor_binding() {
        let n = node("e1");
        n.add_config_key(
            SpecParameter::new("url", ValueKind::String).with_sensor("url.sensor"),
        );
        assert_eq!(n.sensors(), vec!["url.sensor".to_string()]);
    }

    #[test]
    fn test_catalog_narrowing_clears_keys() {
        let n = node("e1");
        n.add_config_key(SpecParameter::new("inherited", ValueKind::String).with_default("x"));
        n.clear_config_keys();
        n.add_config_key(SpecParameter::new("narrow", ValueKind::String));

        assert_eq!(n.config_value("inherited"), None);
    }
}
