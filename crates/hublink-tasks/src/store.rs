//! Storage boundary for the worker side of the task queue.
//!
//! Workers claim, complete, retry, and dead-letter tasks through this
//! trait. The production implementation delegates to the core repository;
//! tests substitute an in-memory queue.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hublink_core::{storage::Storage, TaskId, WebhookTask};

use crate::error::{Result, TaskError};

/// Queue operations consumed by workers.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Claims up to `batch_size` pending tasks whose retry time has passed.
    ///
    /// Claimed tasks transition to running; no two workers receive the
    /// same task instance.
    async fn claim_pending(&self, batch_size: usize, now: DateTime<Utc>)
        -> Result<Vec<WebhookTask>>;

    /// Checks whether a delivery id has already been processed.
    async fn is_delivery_processed(&self, delivery_id: &str) -> Result<bool>;

    /// Marks a task completed and records its delivery id atomically.
    async fn complete(&self, id: TaskId, delivery_id: &str) -> Result<()>;

    /// Marks a task permanently failed; it will not be retried.
    async fn fail_permanent(&self, id: TaskId, error: &str) -> Result<()>;

    /// Returns a task to pending with a scheduled retry time.
    async fn schedule_retry(
        &self,
        id: TaskId,
        next_retry_at: DateTime<Utc>,
        error: &str,
    ) -> Result<()>;

    /// Moves a task to the dead-letter state for manual inspection.
    async fn dead_letter(&self, id: TaskId, error: &str) -> Result<()>;
}

/// PostgreSQL-backed task store delegating to the core repository.
#[derive(Clone)]
pub struct PostgresTaskStore {
    storage: Arc<Storage>,
}

impl PostgresTaskStore {
    /// Creates a task store over the given storage layer.
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl TaskStore for PostgresTaskStore {
    async fn claim_pending(
        &self,
        batch_size: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<WebhookTask>> {
        self.storage
            .webhook_tasks
            .claim_pending(batch_size, now)
            .await
            .map_err(|e| TaskError::storage(e.to_string()))
    }

    async fn is_delivery_processed(&self, delivery_id: &str) -> Result<bool> {
        self.storage
            .webhook_tasks
            .is_delivery_processed(delivery_id)
            .await
            .map_err(|e| TaskError::storage(e.to_string()))
    }

    async fn complete(&self, id: TaskId, delivery_id: &str) -> Result<()> {
        self.storage
            .webhook_tasks
            .complete(id, delivery_id)
            .await
            .map_err(|e| TaskError::storage(e.to_string()))
    }

    async fn fail_permanent(&self, id: TaskId, error: &str) -> Result<()> {
        self.storage
            .webhook_tasks
            .fail_permanent(id, error)
            .await
            .map_err(|e| TaskError::storage(e.to_string()))
    }

    async fn schedule_retry(
        &self,
        id: TaskId,
        next_retry_at: DateTime<Utc>,
        error: &str,
    ) -> Result<()> {
        self.storage
            .webhook_tasks
            .schedule_retry(id, next_retry_at, error)
            .await
            .map_err(|e| TaskError::storage(e.to_string()))
    }

    async fn dead_letter(&self, id: TaskId, error: &str) -> Result<()> {
        self.storage
            .webhook_tasks
            .dead_letter(id, error)
            .await
            .map_err(|e| TaskError::storage(e.to_string()))
    }
}
