//! Entity specification tree
//!
//! An [`EntitySpec`] is the immutable, declarative description of a
//! component to create: its type, configuration, children, locations,
//! initializers and attachments. Specs are produced by an external
//! blueprint-parsing layer and consumed by the construction engine.
//!
//! Parent, owner and identity are expressed through dedicated fields here -
//! never through the generic config or flags maps, whose reserved keys are
//! rejected at construction time.

use crate::initializer::EntityInitializer;
use arbor_types::{
    ConfigValue, EnricherSpec, EntityId, Location, LocationSpec, PolicySpec, SpecParameter,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Declarative description of an entity to create
#[derive(Clone)]
pub struct EntitySpec {
    /// Declared type, resolved through the type registry
    pub type_name: String,

    /// Explicit implementation type, taking precedence over the registry
    /// lookup by declared type
    pub implementation: Option<String>,

    /// Human-readable name
    pub display_name: Option<String>,

    /// Explicit identity; generated when absent
    pub id: Option<EntityId>,

    /// Catalog item this spec originates from, if any
    pub catalog_item_id: Option<String>,

    /// Explicit configuration values
    pub config: BTreeMap<String, ConfigValue>,

    /// Construction flags, applied as typed field assignments
    pub flags: BTreeMap<String, ConfigValue>,

    /// Declared parameters, becoming config keys on the entity's type
    pub parameters: Vec<SpecParameter>,

    /// Tags copied onto the entity
    pub tags: Vec<String>,

    /// Additional capability interfaces for the handle
    pub capabilities: Vec<String>,

    /// Pre-declared parent; when this spec is built as a child, it must
    /// equal the node constructing it
    pub parent: Option<EntityId>,

    /// Child specifications, constructed in declaration order
    pub children: Vec<EntitySpec>,

    /// Already-constructed entities to add as members (type must support
    /// membership)
    pub members: Vec<EntityId>,

    /// Groups the constructed entity joins
    pub groups: Vec<EntityId>,

    /// Locations derived during initialization
    pub location_specs: Vec<LocationSpec>,

    /// Pre-built locations attached as-is during initialization
    pub locations: Vec<Location>,

    /// Initializers applied in declaration order during initialization
    pub initializers: Vec<Arc<dyn EntityInitializer>>,

    /// Enrichers instantiated by the policy factory
    pub enrichers: Vec<EnricherSpec>,

    /// Policies instantiated by the policy factory
    pub policies: Vec<PolicySpec>,
}

impl EntitySpec {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            implementation: None,
            display_name: None,
            id: None,
            catalog_item_id: None,
            config: BTreeMap::new(),
            flags: BTreeMap::new(),
            parameters: Vec::new(),
            tags: Vec::new(),
            capabilities: Vec::new(),
            parent: None,
            children: Vec::new(),
            members: Vec::new(),
            groups: Vec::new(),
            location_specs: Vec::new(),
            locations: Vec::new(),
            initializers: Vec::new(),
            enrichers: Vec::new(),
            policies: Vec::new(),
        }
    }

    /// Use an explicit implementation type instead of the registry lookup
    pub fn with_implementation(mut self, implementation: impl Into<String>) -> Self {
        self.implementation = Some(implementation.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_id(mut self, id: EntityId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_catalog_item_id(mut self, id: impl Into<String>) -> Self {
        self.catalog_item_id = Some(id.into());
        self
    }

    /// Set an explicit configuration value
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Set a construction flag
    pub fn with_flag(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.flags.insert(key.into(), value.into());
        self
    }

    pub fn with_parameter(mut self, parameter: SpecParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.push(capability.into());
        self
    }

    pub fn with_parent(mut self, parent: EntityId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_child(mut self, child: EntitySpec) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_member(mut self, member: EntityId) -> Self {
        self.members.push(member);
        self
    }

    pub fn with_group(mut self, group: EntityId) -> Self {
        self.groups.push(group);
        self
    }

    pub fn with_location_spec(mut self, spec: LocationSpec) -> Self {
        self.location_specs.push(spec);
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.locations.push(location);
        self
    }

    pub fn with_initializer(mut self, initializer: Arc<dyn EntityInitializer>) -> Self {
        self.initializers.push(initializer);
        self
    }

    pub fn with_enricher(mut self, spec: EnricherSpec) -> Self {
        self.enrichers.push(spec);
        self
    }

    pub fn with_policy(mut self, spec: PolicySpec) -> Self {
        self.policies.push(spec);
        self
    }
}

impl std::fmt::Debug for EntitySpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntitySpec")
            .field("type_name", &self.type_name)
            .field("implementation", &self.implementation)
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("catalog_item_id", &self.catalog_item_id)
            .field("children", &self.children.len())
            .field("initializers", &self.initializers.len())
            .field("enrichers", &self.enrichers.len())
            .field("policies", &self.policies.len())
            .finish()
    }
}
