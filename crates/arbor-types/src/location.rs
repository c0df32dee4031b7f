//! Location values attached to entities

use crate::config::ConfigValue;
use crate::ids::{EntityId, LocationId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A location attached to an entity
///
/// Locations derived from a specification during initialization carry a tag
/// naming the entity that owns them, so a location can always be traced back
/// to the entity it was created for.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Location {
    /// Unique location identifier
    pub id: LocationId,

    /// Location kind, e.g. `ssh`, `localhost`
    pub kind: String,

    /// Location configuration
    pub config: BTreeMap<String, ConfigValue>,

    /// Entity this location was created for, when derived from a spec
    pub owner: Option<EntityId>,
}

impl Location {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            id: LocationId::generate(),
            kind: kind.into(),
            config: BTreeMap::new(),
            owner: None,
        }
    }

    /// Tag this location with its owning entity
    pub fn owned_by(mut self, owner: EntityId) -> Self {
        self.owner = Some(owner);
        self
    }
}
