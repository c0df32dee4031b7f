//! Location creation
//!
//! Locations derived from a spec during initialization are tagged with the
//! identity of the entity they were created for, so ownership survives
//! serialization of the location on its own.

use arbor_types::{EntityId, Location, LocationSpec};

/// Creates derived location objects from location specs
pub struct LocationManager;

impl LocationManager {
    pub fn new() -> Self {
        Self
    }

    /// Construct a location from its spec, tagged with the owning entity
    pub fn create_location(&self, spec: &LocationSpec, owner: &EntityId) -> Location {
        let mut location = Location::new(spec.kind.clone());
        location.config = spec.config.clone();
        location.owned_by(owner.clone())
    }
}

impl Default for LocationManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_types::ConfigValue;

    #[test]
    fn test_derived_location_carries_owner() {
        let manager = LocationManager::new();
        let spec = LocationSpec::new("ssh").with_config("host", "10.0.0.1");
        let owner = EntityId::new("e1");

        let location = manager.create_location(&spec, &owner);

        assert_eq!(location.kind, "ssh");
        assert_eq!(location.owner, Some(owner));
        assert_eq!(
            location.config.get("host"),
            Some(&ConfigValue::from("10.0.0.1"))
        );
    }
}
