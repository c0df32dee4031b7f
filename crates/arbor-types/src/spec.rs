//! Descriptor types for cross-cutting attachments
//!
//! These are the declarative descriptions of the objects attached to an
//! entity during initialization: locations, enrichers and policies. The
//! entity specification tree itself lives in `arbor-entity`, since it also
//! carries behavior (initializers); the descriptors here are pure data,
//! produced by the external blueprint-parsing layer.

use crate::config::ConfigValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Specification of a location to derive during initialization
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LocationSpec {
    /// Location kind, e.g. `ssh`, `localhost`
    pub kind: String,

    /// Location configuration
    pub config: BTreeMap<String, ConfigValue>,
}

impl LocationSpec {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            config: BTreeMap::new(),
        }
    }

    /// Set a configuration entry
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }
}

/// Specification of an enricher, instantiated by the policy factory
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnricherSpec {
    /// Enricher kind, resolved by the policy factory
    pub kind: String,

    /// Enricher configuration
    pub config: BTreeMap<String, ConfigValue>,
}

impl EnricherSpec {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            config: BTreeMap::new(),
        }
    }

    /// Set a configuration entry
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }
}

/// Specification of a policy, instantiated by the policy factory
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolicySpec {
    /// Policy kind, resolved by the policy factory
    pub kind: String,

    /// Policy configuration
    pub config: BTreeMap<String, ConfigValue>,
}

impl PolicySpec {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            config: BTreeMap::new(),
        }
    }

    /// Set a configuration entry
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }
}
