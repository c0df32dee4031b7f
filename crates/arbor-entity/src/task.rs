//! Task-execution boundary
//!
//! Initialization and effector work is submitted to an external
//! task-execution collaborator as discrete units of work, so that work
//! attributable to one entity can be observed, awaited or cancelled without
//! affecting unrelated entities. The contract is narrow: submit a unit of
//! work, block for its result or failure.

use crate::error::TaskError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info_span, Instrument};

/// Value produced by a completed unit of work
#[derive(Clone, Debug, PartialEq)]
pub enum TaskValue {
    Unit,
    Text(String),
}

/// A schedulable unit of work
pub struct Task {
    /// Display name, used for spans and failure messages
    pub display_name: String,

    /// Transient tasks are not retained once completed
    pub transient: bool,

    /// The work itself
    pub body: BoxFuture<'static, Result<TaskValue, TaskError>>,
}

impl Task {
    pub fn new(
        display_name: impl Into<String>,
        body: BoxFuture<'static, Result<TaskValue, TaskError>>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            transient: false,
            body,
        }
    }

    /// A task that is not retained once completed
    pub fn transient(
        display_name: impl Into<String>,
        body: BoxFuture<'static, Result<TaskValue, TaskError>>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            transient: true,
            body,
        }
    }
}

/// External task-execution collaborator
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Submit a unit of work and block for its result
    async fn submit(&self, task: Task) -> Result<TaskValue, TaskError>;
}

/// Executor running each unit of work on the local tokio runtime
pub struct LocalTaskExecutor;

#[async_trait]
impl TaskExecutor for LocalTaskExecutor {
    async fn submit(&self, task: Task) -> Result<TaskValue, TaskError> {
        let name = task.display_name.clone();
        let span = info_span!("task", name = %task.display_name, transient = task.transient);
        let handle = tokio::spawn(task.body.instrument(span));
        match handle.await {
            Ok(result) => result,
            Err(_) => Err(TaskError::Panicked { task: name }),
        }
    }
}

/// Execution context a creation call (or effector invocation) runs under
///
/// Carries the task executor and the cancellation flag. Cancelling stops
/// further sibling/child work from being scheduled; already-submitted units
/// are not retracted, their results are simply no longer awaited.
#[derive(Clone)]
pub struct ExecutionContext {
    executor: Arc<dyn TaskExecutor>,
    cancelled: Arc<AtomicBool>,
}

impl ExecutionContext {
    pub fn new(executor: Arc<dyn TaskExecutor>) -> Self {
        Self {
            executor,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn executor(&self) -> &Arc<dyn TaskExecutor> {
        &self.executor
    }

    /// Request cancellation of all work scheduled under this context
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
