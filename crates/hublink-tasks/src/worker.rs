//! Task workers that drain the webhook queue.
//!
//! Workers claim batches from PostgreSQL using SKIP LOCKED so a task is
//! processed by exactly one worker, check the processed-delivery ledger
//! before invoking the processor, and apply the retry policy to transient
//! failures. They run until their cancellation token fires.

use std::{sync::Arc, time::Duration};

use hublink_core::{Clock, WebhookTask};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    error::Result,
    processor::{ProcessError, WebhookDelivery, WebhookProcessor},
    retry::{RetryDecision, RetryPolicy},
    store::TaskStore,
};

/// Configuration for the task worker pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of concurrent task workers.
    pub worker_count: usize,

    /// Maximum tasks to claim per worker batch.
    pub batch_size: usize,

    /// How often idle workers poll for new tasks.
    pub poll_interval: Duration,

    /// Retry policy applied to transient processing failures.
    pub retry_policy: RetryPolicy,

    /// Maximum time to wait for workers to drain on shutdown.
    pub shutdown_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_count: crate::DEFAULT_WORKER_COUNT,
            batch_size: crate::DEFAULT_BATCH_SIZE,
            poll_interval: Duration::from_secs(1),
            retry_policy: RetryPolicy::default(),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

/// Counters for pool monitoring.
#[derive(Debug, Clone, Default)]
pub struct WorkerStats {
    /// Number of active workers.
    pub active_workers: usize,
    /// Total tasks pulled from the queue since startup.
    pub tasks_processed: u64,
    /// Tasks completed successfully.
    pub completed: u64,
    /// Tasks skipped because their delivery id was already processed.
    pub duplicates_skipped: u64,
    /// Transient failures that were rescheduled.
    pub retries_scheduled: u64,
    /// Tasks failed permanently without retry.
    pub permanent_failures: u64,
    /// Tasks moved to the dead-letter state after exhausting retries.
    pub dead_lettered: u64,
}

/// Individual worker that claims and processes webhook tasks.
pub struct Worker {
    id: usize,
    store: Arc<dyn TaskStore>,
    processor: Arc<dyn WebhookProcessor>,
    config: WorkerConfig,
    stats: Arc<RwLock<WorkerStats>>,
    cancellation_token: CancellationToken,
    clock: Arc<dyn Clock>,
}

impl Worker {
    /// Creates a worker with the given collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: usize,
        store: Arc<dyn TaskStore>,
        processor: Arc<dyn WebhookProcessor>,
        config: WorkerConfig,
        stats: Arc<RwLock<WorkerStats>>,
        cancellation_token: CancellationToken,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { id, store, processor, config, stats, cancellation_token, clock }
    }

    /// Main worker loop, claims and processes tasks until cancelled.
    ///
    /// # Errors
    ///
    /// Returns error only if worker setup fails. Batch failures are logged
    /// and retried after a pause.
    pub async fn run(&self) -> Result<()> {
        info!(worker_id = self.id, "task worker starting");

        loop {
            if self.cancellation_token.is_cancelled() {
                info!(worker_id = self.id, "task worker received shutdown signal");
                break;
            }

            match self.process_batch().await {
                Ok(processed_count) => {
                    if processed_count == 0 {
                        tokio::select! {
                            () = self.clock.sleep(self.config.poll_interval) => {}
                            () = self.cancellation_token.cancelled() => break,
                        }
                    }
                },
                Err(error) => {
                    error!(
                        worker_id = self.id,
                        error = %error,
                        "batch claim or processing failed"
                    );
                    tokio::select! {
                        () = self.clock.sleep(Duration::from_secs(5)) => {
                            // Pause before retrying to avoid a tight error loop
                        }
                        () = self.cancellation_token.cancelled() => break,
                    }
                },
            }
        }

        info!(worker_id = self.id, "task worker stopped");
        Ok(())
    }

    /// Claims and processes one batch of pending tasks.
    ///
    /// # Errors
    ///
    /// Returns error if claiming from the queue fails.
    pub async fn process_batch(&self) -> Result<usize> {
        let now = self.clock.now_utc();
        let tasks = self.store.claim_pending(self.config.batch_size, now).await?;
        let batch_size = tasks.len();

        debug!(worker_id = self.id, batch_size, "processing task batch");

        for task in tasks {
            if self.cancellation_token.is_cancelled() {
                break;
            }

            if let Err(error) = self.process_task(task).await {
                error!(
                    worker_id = self.id,
                    error = %error,
                    "task processing failed"
                );
            }
        }

        Ok(batch_size)
    }

    /// Runs a single claimed task through the processing pipeline.
    ///
    /// Parse failures and missing headers are permanent. A delivery id
    /// already in the ledger completes the task without invoking the
    /// processor. Transient failures go through the retry policy.
    ///
    /// # Errors
    ///
    /// Returns error if a queue status update fails.
    async fn process_task(&self, task: WebhookTask) -> Result<()> {
        {
            let mut stats = self.stats.write().await;
            stats.tasks_processed += 1;
        }

        let attempt_number = u32::try_from(task.failure_count + 1).unwrap_or(u32::MAX);

        let delivery = match WebhookDelivery::from_task(&task) {
            Ok(delivery) => delivery,
            Err(error) => {
                return self.fail_permanent(&task, &error.to_string()).await;
            },
        };

        if self.store.is_delivery_processed(&delivery.delivery_id).await? {
            debug!(
                worker_id = self.id,
                task_id = %task.id,
                delivery_id = %delivery.delivery_id,
                "delivery already processed, completing without reprocessing"
            );
            self.store.complete(task.id, &delivery.delivery_id).await?;
            let mut stats = self.stats.write().await;
            stats.duplicates_skipped += 1;
            return Ok(());
        }

        match self.processor.process(&delivery).await {
            Ok(()) => {
                self.store.complete(task.id, &delivery.delivery_id).await?;
                info!(
                    worker_id = self.id,
                    task_id = %task.id,
                    delivery_id = %delivery.delivery_id,
                    event_kind = %delivery.event_kind,
                    attempt_number,
                    "webhook task completed"
                );
                let mut stats = self.stats.write().await;
                stats.completed += 1;
                Ok(())
            },
            Err(ProcessError::Permanent(reason)) => self.fail_permanent(&task, &reason).await,
            Err(ProcessError::Transient(reason)) => {
                self.handle_transient_failure(&task, attempt_number, &reason).await
            },
        }
    }

    async fn fail_permanent(&self, task: &WebhookTask, reason: &str) -> Result<()> {
        self.store.fail_permanent(task.id, reason).await?;
        error!(
            worker_id = self.id,
            task_id = %task.id,
            reason,
            "task failed permanently"
        );
        let mut stats = self.stats.write().await;
        stats.permanent_failures += 1;
        Ok(())
    }

    async fn handle_transient_failure(
        &self,
        task: &WebhookTask,
        attempt_number: u32,
        reason: &str,
    ) -> Result<()> {
        let failed_at = self.clock.now_utc();

        match self.config.retry_policy.decide(attempt_number, failed_at) {
            RetryDecision::Retry { next_attempt_at } => {
                self.store.schedule_retry(task.id, next_attempt_at, reason).await?;
                warn!(
                    worker_id = self.id,
                    task_id = %task.id,
                    attempt_number,
                    next_retry_at = %next_attempt_at,
                    reason,
                    "task failed, retry scheduled"
                );
                let mut stats = self.stats.write().await;
                stats.retries_scheduled += 1;
            },
            RetryDecision::GiveUp { reason: give_up_reason } => {
                self.store.dead_letter(task.id, reason).await?;
                error!(
                    worker_id = self.id,
                    task_id = %task.id,
                    attempt_number,
                    reason = %give_up_reason,
                    last_error = reason,
                    "task moved to dead-letter"
                );
                let mut stats = self.stats.write().await;
                stats.dead_lettered += 1;
            },
        }
        Ok(())
    }
}
