//! Configuration model
//!
//! Configuration is a string-keyed map of typed values. A value may be a
//! deferred [`ConfigValue::Reference`] naming another entity's configuration
//! key; references are resolved lazily by the entity manager, not here.
//!
//! Parent/owner/identity relationships are structural and carried by
//! dedicated specification fields, never by generic configuration. The
//! reserved keys below are rejected at construction time wherever they
//! appear in a config or flags map.

use crate::ids::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Keys that express structure and must never appear in generic config
pub const RESERVED_STRUCTURAL_KEYS: [&str; 3] = ["parent", "owner", "id"];

/// Whether a config/flags key is reserved for structural use
pub fn is_reserved_structural_key(key: &str) -> bool {
    RESERVED_STRUCTURAL_KEYS.contains(&key)
}

/// A configuration value
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ConfigValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<ConfigValue>),
    Map(BTreeMap<String, ConfigValue>),

    /// Deferred value: another entity's configuration key, resolved lazily
    /// by the entity manager within the calling entity's execution context.
    Reference { entity: EntityId, key: String },
}

impl ConfigValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            ConfigValue::String(_) => ValueKind::String,
            ConfigValue::Int(_) => ValueKind::Int,
            ConfigValue::Float(_) => ValueKind::Float,
            ConfigValue::Bool(_) => ValueKind::Bool,
            ConfigValue::List(_) => ValueKind::List,
            ConfigValue::Map(_) => ValueKind::Map,
            ConfigValue::Reference { .. } => ValueKind::Reference,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, ConfigValue>> {
        match self {
            ConfigValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Whether this value (at any depth) still contains a deferred reference
    pub fn contains_reference(&self) -> bool {
        match self {
            ConfigValue::Reference { .. } => true,
            ConfigValue::List(items) => items.iter().any(ConfigValue::contains_reference),
            ConfigValue::Map(entries) => entries.values().any(ConfigValue::contains_reference),
            _ => false,
        }
    }

    /// Plain JSON rendering, used when serializing values for transport
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ConfigValue::String(s) => serde_json::Value::String(s.clone()),
            ConfigValue::Int(i) => serde_json::Value::from(*i),
            ConfigValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ConfigValue::Bool(b) => serde_json::Value::Bool(*b),
            ConfigValue::List(items) => {
                serde_json::Value::Array(items.iter().map(ConfigValue::to_json).collect())
            }
            ConfigValue::Map(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            ConfigValue::Reference { entity, key } => {
                // Unresolved references render as an explicit marker object
                let mut obj = serde_json::Map::new();
                obj.insert("$entity".into(), serde_json::Value::String(entity.to_string()));
                obj.insert("$key".into(), serde_json::Value::String(key.clone()));
                serde_json::Value::Object(obj)
            }
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::String(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::String(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Int(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

/// Kinds a configuration value can take
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueKind {
    String,
    Int,
    Float,
    Bool,
    List,
    Map,
    Reference,
}

/// A parameter declared on a specification
///
/// Parameters become declared configuration keys on the constructed entity's
/// dynamic type; an optional sensor binding publishes the value as a sensor
/// of the same name.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpecParameter {
    /// Configuration key name
    pub name: String,

    /// Expected value kind
    pub kind: ValueKind,

    /// Default applied when no explicit value is set
    pub default: Option<ConfigValue>,

    /// Sensor published alongside the config key, if any
    pub sensor: Option<String>,

    /// Constraints validated before initialization
    pub constraints: Vec<ConfigConstraint>,
}

impl SpecParameter {
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
            sensor: None,
            constraints: Vec::new(),
        }
    }

    /// Set the default value
    pub fn with_default(mut self, value: impl Into<ConfigValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Bind a sensor of the given name to this parameter
    pub fn with_sensor(mut self, sensor: impl Into<String>) -> Self {
        self.sensor = Some(sensor.into());
        self
    }

    /// Add a constraint
    pub fn with_constraint(mut self, constraint: ConfigConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }
}

/// A declared constraint on a configuration key
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ConfigConstraint {
    /// A value must be present (explicitly set or defaulted)
    Required,

    /// A present string value must not be blank
    NonBlank,

    /// A present string value must be one of the listed alternatives
    OneOf(Vec<String>),
}

impl ConfigConstraint {
    /// Check a value against this constraint
    ///
    /// `value` is the effective value for the key: the explicit setting if
    /// any, else the declared default. Constraints other than `Required`
    /// pass on absent values.
    pub fn check(&self, value: Option<&ConfigValue>) -> bool {
        match self {
            ConfigConstraint::Required => value.is_some(),
            ConfigConstraint::NonBlank => match value {
                Some(ConfigValue::String(s)) => !s.trim().is_empty(),
                _ => true,
            },
            ConfigConstraint::OneOf(allowed) => match value {
                Some(ConfigValue::String(s)) => allowed.iter().any(|a| a == s),
                _ => true,
            },
        }
    }
}

impl std::fmt::Display for ConfigConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigConstraint::Required => write!(f, "required"),
            ConfigConstraint::NonBlank => write!(f, "non-blank"),
            ConfigConstraint::OneOf(allowed) => write!(f, "one of [{}]", allowed.join(", ")),
        }
    }
}
