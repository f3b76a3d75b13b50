//! Repository for the durable webhook task queue.
//!
//! Tasks survive process restarts: a crash between enqueue and execution
//! never silently drops an event. Workers claim tasks with
//! `FOR UPDATE SKIP LOCKED` so multiple workers never run the same task
//! instance concurrently.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::Result,
    models::{NewWebhookTask, TaskId, TaskStatus, WebhookTask},
};

const TASK_COLUMNS: &str = "id, status, headers, body, payload_size, failure_count, \
                            received_at, last_attempt_at, next_retry_at, completed_at, \
                            failed_at, last_error";

/// Repository for webhook task database operations.
pub struct Repository {
    pool: Arc<PgPool>,
}

impl Repository {
    /// Creates a new repository instance.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Enqueues a new webhook task.
    ///
    /// Returns promptly after the insert commits; execution happens on the
    /// worker pool. Multiple ingress instances may enqueue concurrently
    /// without coordination.
    ///
    /// # Errors
    ///
    /// Returns error if the insert fails (queue unavailable).
    pub async fn create(&self, task: &NewWebhookTask) -> Result<TaskId> {
        let id = TaskId::new();
        let payload_size = i32::try_from(task.body.len()).unwrap_or(i32::MAX).max(1);

        sqlx::query(
            r"
            INSERT INTO webhook_tasks (
                id, status, headers, body, payload_size, failure_count, received_at
            )
            VALUES ($1, $2, $3, $4, $5, 0, $6)
            ",
        )
        .bind(id)
        .bind(TaskStatus::Pending)
        .bind(sqlx::types::Json(&task.headers))
        .bind(task.body.as_ref())
        .bind(payload_size)
        .bind(task.received_at)
        .execute(&*self.pool)
        .await?;

        Ok(id)
    }

    /// Claims pending tasks for processing.
    ///
    /// Uses `FOR UPDATE SKIP LOCKED` so concurrent workers claim disjoint
    /// task sets without blocking. Tasks are claimed oldest first; only
    /// tasks whose retry time has passed are eligible.
    ///
    /// # Errors
    ///
    /// Returns error if the claim transaction fails.
    pub async fn claim_pending(&self, batch_size: usize, now: DateTime<Utc>) -> Result<Vec<WebhookTask>> {
        let mut tx = self.pool.begin().await?;

        let task_ids: Vec<Uuid> = sqlx::query_scalar(
            r"
            SELECT id FROM webhook_tasks
            WHERE status = 'pending'
              AND (next_retry_at IS NULL OR next_retry_at <= $1)
            ORDER BY received_at ASC
            LIMIT $2
            FOR UPDATE SKIP LOCKED
            ",
        )
        .bind(now)
        .bind(i64::try_from(batch_size).unwrap_or(i64::MAX))
        .fetch_all(&mut *tx)
        .await?;

        if task_ids.is_empty() {
            tx.rollback().await?;
            return Ok(Vec::new());
        }

        let tasks = sqlx::query_as::<_, WebhookTask>(&format!(
            r"
            UPDATE webhook_tasks
            SET status = 'running', last_attempt_at = $2
            WHERE id = ANY($1)
            RETURNING {TASK_COLUMNS}
            ",
        ))
        .bind(&task_ids)
        .bind(now)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(tasks)
    }

    /// Marks a task completed and records its delivery id in one
    /// transaction.
    ///
    /// The processed-delivery ledger and the task status move together, so
    /// a later redelivery of the same delivery id is observed as already
    /// handled.
    ///
    /// # Errors
    ///
    /// Returns error if the transaction fails; neither write applies.
    pub async fn complete(&self, id: TaskId, delivery_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            UPDATE webhook_tasks
            SET status = 'completed', completed_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
            INSERT INTO processed_deliveries (delivery_id, task_id, processed_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (delivery_id) DO NOTHING
            ",
        )
        .bind(delivery_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }

    /// Checks whether a delivery id has already been processed.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn is_delivery_processed(&self, delivery_id: &str) -> Result<bool> {
        let exists: Option<(String,)> = sqlx::query_as(
            "SELECT delivery_id FROM processed_deliveries WHERE delivery_id = $1",
        )
        .bind(delivery_id)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(exists.is_some())
    }

    /// Marks a task permanently failed.
    ///
    /// Terminal state for malformed payloads; the task is never retried.
    ///
    /// # Errors
    ///
    /// Returns error if the update fails.
    pub async fn fail_permanent(&self, id: TaskId, error: &str) -> Result<()> {
        sqlx::query(
            r"
            UPDATE webhook_tasks
            SET status = 'failed', failed_at = NOW(),
                failure_count = failure_count + 1, last_error = $2
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(error)
        .execute(&*self.pool)
        .await?;

        Ok(())
    }

    /// Returns a task to pending with a scheduled retry time.
    ///
    /// # Errors
    ///
    /// Returns error if the update fails.
    pub async fn schedule_retry(
        &self,
        id: TaskId,
        next_retry_at: DateTime<Utc>,
        error: &str,
    ) -> Result<()> {
        sqlx::query(
            r"
            UPDATE webhook_tasks
            SET status = 'pending', next_retry_at = $2,
                failure_count = failure_count + 1, last_error = $3
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(next_retry_at)
        .bind(error)
        .execute(&*self.pool)
        .await?;

        Ok(())
    }

    /// Moves a task to the dead-letter state after exhausted retries.
    ///
    /// The row is retained for manual inspection and reprocessing.
    ///
    /// # Errors
    ///
    /// Returns error if the update fails.
    pub async fn dead_letter(&self, id: TaskId, error: &str) -> Result<()> {
        sqlx::query(
            r"
            UPDATE webhook_tasks
            SET status = 'dead_letter', failed_at = NOW(),
                failure_count = failure_count + 1, last_error = $2
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(error)
        .execute(&*self.pool)
        .await?;

        Ok(())
    }

    /// Finds a task by its identifier.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn find_by_id(&self, id: TaskId) -> Result<Option<WebhookTask>> {
        let task = sqlx::query_as::<_, WebhookTask>(&format!(
            "SELECT {TASK_COLUMNS} FROM webhook_tasks WHERE id = $1",
        ))
        .bind(id)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(task)
    }

    /// Counts tasks by status, for operational visibility.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn counts_by_status(&self) -> Result<HashMap<String, i64>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM webhook_tasks GROUP BY status",
        )
        .fetch_all(&*self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }
}
