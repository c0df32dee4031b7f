//! Management event stream types
//!
//! All subsystems report lifecycle milestones onto a unified event stream
//! for monitoring and audit. Events are wrapped in an envelope carrying a
//! unique id, timestamp and severity.

use crate::ids::EntityId;
use serde::{Deserialize, Serialize};

/// Events emitted by the management core
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ManagementEvent {
    /// An entity was constructed (not yet initialized)
    EntityCreated {
        entity: EntityId,
        type_name: String,
    },

    /// An entity finished its own initialization steps
    EntityInitialized { entity: EntityId },

    /// Initialization of an entity failed
    InitializationFailed {
        entity: EntityId,
        reason: String,
    },

    /// An effector was invoked on an entity
    EffectorInvoked {
        entity: EntityId,
        effector: String,
    },

    /// The management node switched operating mode
    NodeModeChanged { read_only: bool },
}

/// Event severity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventSeverity {
    Info,
    Warning,
    Error,
}

/// Envelope wrapping every emitted event
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event id
    pub id: uuid::Uuid,

    /// Emission timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,

    /// Severity
    pub severity: EventSeverity,

    /// The event itself
    pub event: ManagementEvent,
}

impl EventEnvelope {
    pub fn new(event: ManagementEvent, severity: EventSeverity) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
            severity,
            event,
        }
    }
}
