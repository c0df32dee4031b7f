//! Type registry trait and in-memory implementation

use crate::behavior::{BasicEntityBehavior, EntityBehavior};
use crate::error::{RegistryError, Result};
use dashmap::DashMap;
use std::sync::Arc;

/// Constructor for a type's behavior object
pub type BehaviorConstructor = Arc<dyn Fn() -> Arc<dyn EntityBehavior> + Send + Sync>;

/// Everything the construction engine needs to know about a type
#[derive(Clone)]
pub struct EntityTypeDefinition {
    /// Declared type name
    pub type_name: String,

    /// Behavior constructor, invoked once per entity
    pub constructor: BehaviorConstructor,

    /// Capability interfaces declared by the type
    pub capabilities: Vec<String>,

    /// Whether the type is constructible new-style (no construction flags)
    pub new_style: bool,
}

impl EntityTypeDefinition {
    pub fn new(type_name: impl Into<String>, constructor: BehaviorConstructor) -> Self {
        Self {
            type_name: type_name.into(),
            constructor,
            capabilities: Vec::new(),
            new_style: true,
        }
    }

    /// A definition backed by [`BasicEntityBehavior`]
    pub fn basic(type_name: impl Into<String>) -> Self {
        let name = type_name.into();
        let ctor_name = name.clone();
        Self::new(name, Arc::new(move || {
            Arc::new(BasicEntityBehavior::new(ctor_name.clone())) as Arc<dyn EntityBehavior>
        }))
    }

    /// A group definition backed by [`BasicEntityBehavior`]
    pub fn basic_group(type_name: impl Into<String>) -> Self {
        let name = type_name.into();
        let ctor_name = name.clone();
        Self::new(name, Arc::new(move || {
            Arc::new(BasicEntityBehavior::group(ctor_name.clone())) as Arc<dyn EntityBehavior>
        }))
    }

    /// Declare capability interfaces for the type
    pub fn with_capabilities(mut self, capabilities: Vec<String>) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Mark the type as old-style (not constructible without flags)
    pub fn old_style(mut self) -> Self {
        self.new_style = false;
        self
    }
}

impl std::fmt::Debug for EntityTypeDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityTypeDefinition")
            .field("type_name", &self.type_name)
            .field("capabilities", &self.capabilities)
            .field("new_style", &self.new_style)
            .finish()
    }
}

/// Registry mapping declared type names to implementations
pub trait EntityTypeRegistry: Send + Sync {
    /// Resolve the definition for a declared type
    fn resolve(&self, type_name: &str) -> Result<EntityTypeDefinition>;

    /// Whether the given type is constructible new-style
    fn is_new_style(&self, type_name: &str) -> Result<bool>;
}

/// In-memory type registry
pub struct InMemoryTypeRegistry {
    types: DashMap<String, EntityTypeDefinition>,
}

impl InMemoryTypeRegistry {
    pub fn new() -> Self {
        Self {
            types: DashMap::new(),
        }
    }

    /// Register a type definition
    pub fn register(&self, definition: EntityTypeDefinition) -> Result<()> {
        if self.types.contains_key(&definition.type_name) {
            return Err(RegistryError::AlreadyRegistered(definition.type_name));
        }
        self.types.insert(definition.type_name.clone(), definition);
        Ok(())
    }
}

impl Default for InMemoryTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityTypeRegistry for InMemoryTypeRegistry {
    fn resolve(&self, type_name: &str) -> Result<EntityTypeDefinition> {
        self.types
            .get(type_name)
            .map(|d| d.clone())
            .ok_or_else(|| RegistryError::UnknownType(type_name.to_string()))
    }

    fn is_new_style(&self, type_name: &str) -> Result<bool> {
        Ok(self.resolve(type_name)?.new_style)
    }
}
