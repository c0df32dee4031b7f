//! Policy factory boundary
//!
//! Enrichers and policies are attachable behaviors created by an external
//! factory collaborator from their declarative specs. This crate defines the
//! boundary and a no-op factory for embedding and tests; enricher/policy
//! internals live elsewhere.

use arbor_types::{EnricherSpec, PolicySpec};
use std::sync::Arc;
use thiserror::Error;

/// Failure creating an enricher or policy
#[derive(Debug, Error)]
#[error("policy factory failed for kind `{kind}`: {message}")]
pub struct PolicyFactoryError {
    pub kind: String,
    pub message: String,
}

impl PolicyFactoryError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// An attachable behavior that observes and reacts to entity state
pub trait Enricher: Send + Sync {
    fn kind(&self) -> &str;
}

/// An attachable behavior that manages an entity
pub trait Policy: Send + Sync {
    fn kind(&self) -> &str;
}

/// Factory creating enrichers and policies from their specs
pub trait PolicyFactory: Send + Sync {
    fn create_enricher(
        &self,
        spec: &EnricherSpec,
    ) -> Result<Arc<dyn Enricher>, PolicyFactoryError>;

    fn create_policy(&self, spec: &PolicySpec) -> Result<Arc<dyn Policy>, PolicyFactoryError>;
}

struct BasicEnricher {
    kind: String,
}

impl Enricher for BasicEnricher {
    fn kind(&self) -> &str {
        &self.kind
    }
}

struct BasicPolicy {
    kind: String,
}

impl Policy for BasicPolicy {
    fn kind(&self) -> &str {
        &self.kind
    }
}

/// Factory producing inert enrichers and policies
pub struct NoOpPolicyFactory;

impl PolicyFactory for NoOpPolicyFactory {
    fn create_enricher(
        &self,
        spec: &EnricherSpec,
    ) -> Result<Arc<dyn Enricher>, PolicyFactoryError> {
        Ok(Arc::new(BasicEnricher {
            kind: spec.kind.clone(),
        }))
    }

    fn create_policy(&self, spec: &PolicySpec) -> Result<Arc<dyn Policy>, PolicyFactoryError> {
        Ok(Arc::new(BasicPolicy {
            kind: spec.kind.clone(),
        }))
    }
}
