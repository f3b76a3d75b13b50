//! In-memory task queue implementing both sides of the queue boundary.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hublink_core::{NewWebhookTask, TaskId, TaskStatus, WebhookTask};
use hublink_tasks::{
    error::{Result, TaskError},
    TaskScheduler, TaskStore,
};

/// Task queue backed by a hash map.
///
/// Implements [`TaskScheduler`] for the ingress side and [`TaskStore`]
/// for the worker side with the same claim and retry semantics as the
/// PostgreSQL queue. A failure toggle simulates an unavailable backend.
#[derive(Default)]
pub struct MemoryTaskQueue {
    tasks: Mutex<HashMap<TaskId, WebhookTask>>,
    processed: Mutex<HashSet<String>>,
    fail_enqueue: AtomicBool,
}

impl MemoryTaskQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent `schedule` calls fail as queue-unavailable.
    pub fn fail_enqueue(&self, fail: bool) {
        self.fail_enqueue.store(fail, Ordering::SeqCst);
    }

    /// Looks up a task by id.
    pub fn find(&self, id: TaskId) -> Option<WebhookTask> {
        self.tasks.lock().unwrap().get(&id).cloned()
    }

    /// Number of tasks currently in the queue, any status.
    pub fn len(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }

    /// Whether the queue holds no tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.lock().unwrap().is_empty()
    }

    /// Snapshot of tasks in a given status.
    pub fn tasks_in_status(&self, status: TaskStatus) -> Vec<WebhookTask> {
        self.tasks.lock().unwrap().values().filter(|t| t.status == status).cloned().collect()
    }

    /// Delivery ids recorded in the processed ledger.
    pub fn processed_deliveries(&self) -> Vec<String> {
        self.processed.lock().unwrap().iter().cloned().collect()
    }

    fn update<F>(&self, id: TaskId, apply: F) -> Result<()>
    where
        F: FnOnce(&mut WebhookTask),
    {
        let mut tasks = self.tasks.lock().unwrap();
        let task = tasks
            .get_mut(&id)
            .ok_or_else(|| TaskError::storage(format!("task {id} not found")))?;
        apply(task);
        Ok(())
    }
}

#[async_trait]
impl TaskScheduler for MemoryTaskQueue {
    async fn schedule(&self, task: NewWebhookTask) -> Result<TaskId> {
        if self.fail_enqueue.load(Ordering::SeqCst) {
            return Err(TaskError::queue_unavailable("simulated enqueue failure"));
        }

        let id = TaskId::new();
        let stored = WebhookTask {
            id,
            status: TaskStatus::Pending,
            headers: sqlx::types::Json(task.headers),
            body: task.body.to_vec(),
            payload_size: i32::try_from(task.body.len()).unwrap_or(i32::MAX).max(1),
            failure_count: 0,
            received_at: task.received_at,
            last_attempt_at: None,
            next_retry_at: None,
            completed_at: None,
            failed_at: None,
            last_error: None,
        };

        self.tasks.lock().unwrap().insert(id, stored);
        Ok(id)
    }
}

#[async_trait]
impl TaskStore for MemoryTaskQueue {
    async fn claim_pending(
        &self,
        batch_size: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<WebhookTask>> {
        let mut tasks = self.tasks.lock().unwrap();

        let mut eligible: Vec<TaskId> = tasks
            .values()
            .filter(|t| {
                t.status == TaskStatus::Pending
                    && t.next_retry_at.map_or(true, |at| at <= now)
            })
            .map(|t| t.id)
            .collect();
        eligible.sort_by_key(|id| tasks[id].received_at);
        eligible.truncate(batch_size);

        let mut claimed = Vec::with_capacity(eligible.len());
        for id in eligible {
            let task = tasks.get_mut(&id).expect("id collected above");
            task.status = TaskStatus::Running;
            task.last_attempt_at = Some(now);
            claimed.push(task.clone());
        }

        Ok(claimed)
    }

    async fn is_delivery_processed(&self, delivery_id: &str) -> Result<bool> {
        Ok(self.processed.lock().unwrap().contains(delivery_id))
    }

    async fn complete(&self, id: TaskId, delivery_id: &str) -> Result<()> {
        self.update(id, |task| {
            task.status = TaskStatus::Completed;
            task.completed_at = Some(Utc::now());
        })?;
        self.processed.lock().unwrap().insert(delivery_id.to_string());
        Ok(())
    }

    async fn fail_permanent(&self, id: TaskId, error: &str) -> Result<()> {
        self.update(id, |task| {
            task.status = TaskStatus::Failed;
            task.failed_at = Some(Utc::now());
            task.failure_count += 1;
            task.last_error = Some(error.to_string());
        })
    }

    async fn schedule_retry(
        &self,
        id: TaskId,
        next_retry_at: DateTime<Utc>,
        error: &str,
    ) -> Result<()> {
        self.update(id, |task| {
            task.status = TaskStatus::Pending;
            task.next_retry_at = Some(next_retry_at);
            task.failure_count += 1;
            task.last_error = Some(error.to_string());
        })
    }

    async fn dead_letter(&self, id: TaskId, error: &str) -> Result<()> {
        self.update(id, |task| {
            task.status = TaskStatus::DeadLetter;
            task.failed_at = Some(Utc::now());
            task.failure_count += 1;
            task.last_error = Some(error.to_string());
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use bytes::Bytes;

    use super::*;

    fn new_task(body: &str) -> NewWebhookTask {
        NewWebhookTask::new(
            HashMap::new(),
            Bytes::copy_from_slice(body.as_bytes()),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn schedule_then_claim_marks_running() {
        let queue = MemoryTaskQueue::new();
        let id = queue.schedule(new_task("{}")).await.unwrap();

        let claimed = queue.claim_pending(10, Utc::now()).await.unwrap();

        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].id, id);
        assert_eq!(queue.find(id).unwrap().status, TaskStatus::Running);
    }

    #[tokio::test]
    async fn claim_skips_tasks_with_future_retry() {
        let queue = MemoryTaskQueue::new();
        let now = Utc::now();
        let id = queue.schedule(new_task("{}")).await.unwrap();
        queue.claim_pending(10, now).await.unwrap();
        queue
            .schedule_retry(id, now + chrono::Duration::seconds(30), "boom")
            .await
            .unwrap();

        assert!(queue.claim_pending(10, now).await.unwrap().is_empty());

        let later = now + chrono::Duration::seconds(31);
        assert_eq!(queue.claim_pending(10, later).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn complete_records_delivery_id() {
        let queue = MemoryTaskQueue::new();
        let id = queue.schedule(new_task("{}")).await.unwrap();
        queue.claim_pending(10, Utc::now()).await.unwrap();

        queue.complete(id, "delivery-1").await.unwrap();

        assert!(queue.is_delivery_processed("delivery-1").await.unwrap());
        assert_eq!(queue.find(id).unwrap().status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn fail_enqueue_returns_queue_unavailable() {
        let queue = MemoryTaskQueue::new();
        queue.fail_enqueue(true);

        let err = queue.schedule(new_task("{}")).await.unwrap_err();
        assert!(matches!(err, TaskError::QueueUnavailable { .. }));
    }
}
