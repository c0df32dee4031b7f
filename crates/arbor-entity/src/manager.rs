//! Management context
//!
//! The management context is the composition root of the core: it holds the
//! live entity table, the node's operating mode, the unified event stream,
//! and the collaborator boundaries (type registry, policy factory, task
//! executor). Entities are addressable through it by identity for as long as
//! they live, including across a rebind.

use crate::error::ResolveError;
use crate::handle::EntityHandle;
use crate::location::LocationManager;
use crate::policy::PolicyFactory;
use crate::task::TaskExecutor;
use arbor_registry::EntityTypeRegistry;
use arbor_types::{ConfigValue, EntityId, EventEnvelope, EventSeverity, ManagementEvent};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

/// Channel capacity for the management event stream
const EVENT_CHANNEL_CAPACITY: usize = 4096;

/// Depth limit for deferred-reference resolution
const MAX_RESOLUTION_DEPTH: usize = 32;

/// Composition root for entity management
pub struct ManagementContext {
    registry: Arc<dyn EntityTypeRegistry>,
    policy_factory: Arc<dyn PolicyFactory>,
    executor: Arc<dyn TaskExecutor>,
    locations: LocationManager,
    entities: DashMap<EntityId, EntityHandle>,
    read_only: Arc<AtomicBool>,
    event_tx: broadcast::Sender<EventEnvelope>,
}

impl ManagementContext {
    pub fn new(
        registry: Arc<dyn EntityTypeRegistry>,
        policy_factory: Arc<dyn PolicyFactory>,
        executor: Arc<dyn TaskExecutor>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            registry,
            policy_factory,
            executor,
            locations: LocationManager::new(),
            entities: DashMap::new(),
            read_only: Arc::new(AtomicBool::new(false)),
            event_tx,
        }
    }

    pub fn registry(&self) -> &Arc<dyn EntityTypeRegistry> {
        &self.registry
    }

    pub fn policy_factory(&self) -> &Arc<dyn PolicyFactory> {
        &self.policy_factory
    }

    pub fn executor(&self) -> &Arc<dyn TaskExecutor> {
        &self.executor
    }

    pub fn location_manager(&self) -> &LocationManager {
        &self.locations
    }

    // ========== Live entity table ==========

    /// Look up a live entity by identity
    pub fn get_entity(&self, id: &EntityId) -> Option<EntityHandle> {
        self.entities.get(id).map(|h| h.clone())
    }

    /// Number of live entities
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub(crate) fn register_entity(&self, handle: EntityHandle) {
        self.entities.insert(handle.id().clone(), handle);
    }

    pub(crate) fn unregister_entity(&self, id: &EntityId) {
        self.entities.remove(id);
    }

    // ========== Node operating mode ==========

    /// Whether the node is in read-only (standby) mode
    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::SeqCst)
    }

    /// Switch the node's operating mode
    ///
    /// In read-only mode, mutating operations through handles are refused at
    /// the handle boundary.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
        info!(read_only, "Node operating mode changed");
        self.emit_info(ManagementEvent::NodeModeChanged { read_only });
    }

    pub(crate) fn read_only_flag(&self) -> Arc<AtomicBool> {
        self.read_only.clone()
    }

    // ========== Events ==========

    /// Subscribe to the management event stream
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.event_tx.subscribe()
    }

    /// Emit an event; no subscribers is fine
    pub fn emit(&self, event: ManagementEvent, severity: EventSeverity) {
        let _ = self.event_tx.send(EventEnvelope::new(event, severity));
    }

    pub fn emit_info(&self, event: ManagementEvent) {
        self.emit(event, EventSeverity::Info);
    }

    pub fn emit_warning(&self, event: ManagementEvent) {
        self.emit(event, EventSeverity::Warning);
    }

    pub fn emit_error(&self, event: ManagementEvent) {
        self.emit(event, EventSeverity::Error);
    }

    // ========== Deferred value resolution ==========

    /// Deeply resolve a configuration value
    ///
    /// Forces every deferred reference (at any depth) to its concrete value
    /// by looking up the referenced entity's effective configuration.
    pub fn resolve_value(&self, value: &ConfigValue) -> Result<ConfigValue, ResolveError> {
        self.resolve_value_at(value, 0)
    }

    fn resolve_value_at(
        &self,
        value: &ConfigValue,
        depth: usize,
    ) -> Result<ConfigValue, ResolveError> {
        if depth > MAX_RESOLUTION_DEPTH {
            return Err(ResolveError::DepthExceeded);
        }
        match value {
            ConfigValue::Reference { entity, key } => {
                let handle = self
                    .get_entity(entity)
                    .ok_or_else(|| ResolveError::UnknownEntity(entity.clone()))?;
                let referenced =
                    handle
                        .config_value(key)
                        .ok_or_else(|| ResolveError::UnresolvedKey {
                            entity: entity.clone(),
                            key: key.clone(),
                        })?;
                self.resolve_value_at(&referenced, depth + 1)
            }
            ConfigValue::List(items) => Ok(ConfigValue::List(
                items
                    .iter()
                    .map(|item| self.resolve_value_at(item, depth + 1))
                    .collect::<Result<_, _>>()?,
            )),
            ConfigValue::Map(entries) => Ok(ConfigValue::Map(
                entries
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), self.resolve_value_at(v, depth + 1)?)))
                    .collect::<Result<_, ResolveError>>()?,
            )),
            other => Ok(other.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::EntityFactory;
    use crate::policy::NoOpPolicyFactory;
    use crate::spec::EntitySpec;
    use crate::task::LocalTaskExecutor;
    use arbor_registry::{EntityTypeDefinition, InMemoryTypeRegistry};

    fn context() -> Arc<ManagementContext> {
        let registry = InMemoryTypeRegistry::new();
        registry
            .register(EntityTypeDefinition::basic("app.server"))
            .unwrap();
        Arc::new(ManagementContext::new(
            Arc::new(registry),
            Arc::new(NoOpPolicyFactory),
            Arc::new(LocalTaskExecutor),
        ))
    }

    #[tokio::test]
    async fn test_reference_resolution() {
        let mgmt = context();
        let factory = EntityFactory::new(mgmt.clone());

        let target = factory
            .create_entity(
                EntitySpec::new("app.server").with_config("host.name", "db.internal"),
                Some(EntityId::new("db")),
            )
            .await
            .unwrap();

        let reference = ConfigValue::Reference {
            entity: target.id().clone(),
            key: "host.name".into(),
        };
        let resolved = mgmt.resolve_value(&reference).unwrap();
        assert_eq!(resolved, ConfigValue::from("db.internal"));
    }

    #[tokio::test]
    async fn test_resolution_failures() {
        let mgmt = context();

        let missing_entity = ConfigValue::Reference {
            entity: EntityId::new("ghost"),
            key: "k".into(),
        };
        assert!(matches!(
            mgmt.resolve_value(&missing_entity),
            Err(ResolveError::UnknownEntity(_))
        ));
    }

    #[tokio::test]
    async fn test_event_stream() {
        let mgmt = context();
        let mut rx = mgmt.subscribe();

        mgmt.set_read_only(true);

        let envelope = rx.try_recv().unwrap();
        assert!(matches!(
            envelope.event,
            ManagementEvent::NodeModeChanged { read_only: true }
        ));
        assert_eq!(envelope.severity, EventSeverity::Info);
    }
}
