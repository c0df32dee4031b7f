//! Initialization engine
//!
//! Initializes a freshly constructed tree top-down: an entity's own
//! initialization steps (init hook, locations, initializers, enrichers,
//! policies) always complete before any of its children's, and siblings run
//! in declaration order. The whole subtree's configuration is validated
//! before any behavior runs, so a single invalid descendant prevents its
//! ancestors' side effects too.
//!
//! Each entity's steps run as one discrete unit of work submitted to the
//! task-execution boundary, so progress and failure are attributable to
//! that entity.

use crate::entity::{EntityNode, EntityStatus};
use crate::error::{CreationError, Result, TaskError};
use crate::factory::CreationArena;
use crate::manager::ManagementContext;
use crate::spec::EntitySpec;
use crate::task::{ExecutionContext, Task, TaskValue};
use arbor_types::{EntityId, ManagementEvent};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Validate configuration constraints for an entity and all descendants
///
/// Breadth-first, deterministic order; the first violation aborts.
pub(crate) fn validate_descendant_config(root: &Arc<EntityNode>) -> Result<()> {
    let mut queue: VecDeque<Arc<EntityNode>> = VecDeque::new();
    queue.push_back(root.clone());
    while let Some(node) = queue.pop_front() {
        node.assert_config_valid()?;
        for child in node.children() {
            queue.push_back(child.node());
        }
    }
    Ok(())
}

/// Initialize an entity and, recursively, its children
///
/// Entities absent from the arena were created dynamically by an
/// initializer, which owes them a completed initialization; they are
/// skipped here.
pub(crate) fn init_entity_and_descendants(
    mgmt: Arc<ManagementContext>,
    id: EntityId,
    arena: Arc<CreationArena>,
    ctx: ExecutionContext,
) -> BoxFuture<'static, Result<()>> {
    async move {
        let (node, spec) = match (arena.entity(&id), arena.spec(&id)) {
            (Some(node), Some(spec)) => (node, spec),
            _ => {
                debug!(
                    entity = %id,
                    "Skipping initialization of child not created by this call; \
                     likely created by an initializer and thus already initialized"
                );
                if cfg!(debug_assertions) {
                    if let Some(handle) = mgmt.get_entity(&id) {
                        debug_assert!(
                            matches!(handle.status(), EntityStatus::Initialized),
                            "dynamically created child {id} must be initialized by its creator"
                        );
                    }
                }
                return Ok(());
            }
        };

        // Validate all config before initializing any entity in the
        // subtree.
        validate_descendant_config(&node)?;

        if ctx.is_cancelled() {
            return Err(CreationError::Cancelled);
        }

        // The per-entity unit of work is transient: nothing retains it once
        // the entity is initialized.
        let display_name = format!("entity initialization ({id})");
        let failure: Arc<Mutex<Option<CreationError>>> = Arc::new(Mutex::new(None));
        let body = {
            let mgmt = mgmt.clone();
            let arena = arena.clone();
            let ctx = ctx.clone();
            let failure = failure.clone();
            let task_name = display_name.clone();
            async move {
                match init_entity(&mgmt, &node, &spec, &arena, &ctx).await {
                    Ok(()) => Ok(TaskValue::Unit),
                    Err(e) => {
                        let message = e.to_string();
                        *failure.lock().unwrap_or_else(|p| p.into_inner()) = Some(e);
                        Err(TaskError::Failed {
                            task: task_name,
                            message,
                        })
                    }
                }
            }
            .boxed()
        };

        match ctx.executor().submit(Task::transient(display_name, body)).await {
            Ok(_) => Ok(()),
            Err(task_error) => Err(failure
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .take()
                .unwrap_or(CreationError::Task(task_error))),
        }
    }
    .boxed()
}

/// Run one entity's initialization steps, then its children's
///
/// A failure in the entity's own steps marks it failed; a failure further
/// down the tree propagates without touching this entity's status, so
/// already-initialized ancestors remain valid.
async fn init_entity(
    mgmt: &Arc<ManagementContext>,
    node: &Arc<EntityNode>,
    spec: &EntitySpec,
    arena: &Arc<CreationArena>,
    ctx: &ExecutionContext,
) -> Result<()> {
    let id = node.id().clone();
    node.set_status(EntityStatus::Initializing);

    if let Err(e) = run_own_init_steps(mgmt, node, spec, ctx).await {
        node.set_status(EntityStatus::Failed {
            reason: e.to_string(),
        });
        mgmt.emit_error(ManagementEvent::InitializationFailed {
            entity: id,
            reason: e.to_string(),
        });
        return Err(e);
    }

    // 5. Children, in declaration order, each only after this entity's own
    //    steps completed.
    for child in node.children() {
        if ctx.is_cancelled() {
            return Err(CreationError::Cancelled);
        }
        init_entity_and_descendants(
            mgmt.clone(),
            child.id().clone(),
            arena.clone(),
            ctx.clone(),
        )
        .await?;
    }

    Ok(())
}

async fn run_own_init_steps(
    mgmt: &Arc<ManagementContext>,
    node: &Arc<EntityNode>,
    spec: &EntitySpec,
    ctx: &ExecutionContext,
) -> Result<()> {
    let id = node.id().clone();

    // 1. The entity's own initialization hook.
    node.behavior()
        .init()
        .map_err(|source| CreationError::InitHook {
            entity: id.clone(),
            source,
        })?;

    // 2. Derived locations (owner-tagged), then pre-built locations.
    for location_spec in &spec.location_specs {
        let location = mgmt
            .location_manager()
            .create_location(location_spec, &id);
        node.add_location(location);
    }
    for location in &spec.locations {
        node.add_location(location.clone());
    }

    // 3. Declared initializers, in declaration order; first failure wins.
    let handle = mgmt.get_entity(&id).ok_or_else(|| {
        CreationError::Internal(format!("handle for {id} missing from live table"))
    })?;
    for initializer in &spec.initializers {
        if ctx.is_cancelled() {
            return Err(CreationError::Cancelled);
        }
        initializer
            .apply(&handle, mgmt)
            .await
            .map_err(|e| CreationError::Initializer {
                entity: id.clone(),
                initializer: initializer.name().to_string(),
                source: Box::new(e),
            })?;
    }

    // 4. Enrichers, then policies, via the policy factory.
    for enricher_spec in &spec.enrichers {
        let enricher = mgmt
            .policy_factory()
            .create_enricher(enricher_spec)
            .map_err(|source| CreationError::Enricher {
                entity: id.clone(),
                kind: enricher_spec.kind.clone(),
                source,
            })?;
        node.attach_enricher(enricher);
    }
    for policy_spec in &spec.policies {
        let policy = mgmt
            .policy_factory()
            .create_policy(policy_spec)
            .map_err(|source| CreationError::Policy {
                entity: id.clone(),
                kind: policy_spec.kind.clone(),
                source,
            })?;
        node.attach_policy(policy);
    }

    node.set_status(EntityStatus::Initialized);
    info!(entity = %id, "Entity initialized");
    mgmt.emit_info(ManagementEvent::EntityInitialized { entity: id.clone() });

    Ok(())
}
