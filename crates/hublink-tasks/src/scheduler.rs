//! Fire-and-forget task scheduling.
//!
//! `schedule` inserts one durable row and returns; it never waits for
//! processing. This keeps the webhook ingress response well inside provider
//! timeouts regardless of processing latency.

use std::sync::Arc;

use async_trait::async_trait;
use hublink_core::{storage::Storage, NewWebhookTask, TaskId};
use tracing::{debug, warn};

use crate::error::{Result, TaskError};

/// Enqueues webhook tasks for asynchronous execution.
///
/// Implementations must return promptly after the task is durably queued;
/// execution order across tasks is not guaranteed.
#[async_trait]
pub trait TaskScheduler: Send + Sync {
    /// Enqueues a task and returns its identifier.
    ///
    /// # Errors
    ///
    /// Returns `TaskError::QueueUnavailable` if the queue backend rejects
    /// the enqueue; the caller must surface a server error so the provider
    /// redelivers.
    async fn schedule(&self, task: NewWebhookTask) -> Result<TaskId>;
}

/// PostgreSQL-backed scheduler writing to the `webhook_tasks` table.
#[derive(Clone)]
pub struct PostgresTaskScheduler {
    storage: Arc<Storage>,
}

impl PostgresTaskScheduler {
    /// Creates a scheduler over the given storage layer.
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl TaskScheduler for PostgresTaskScheduler {
    async fn schedule(&self, task: NewWebhookTask) -> Result<TaskId> {
        match self.storage.webhook_tasks.create(&task).await {
            Ok(task_id) => {
                debug!(task_id = %task_id, payload_size = task.body.len(), "webhook task enqueued");
                Ok(task_id)
            },
            Err(e) => {
                warn!(error = %e, "webhook task enqueue failed");
                Err(TaskError::queue_unavailable(e.to_string()))
            },
        }
    }
}
