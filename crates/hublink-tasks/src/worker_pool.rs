//! Worker pool lifecycle with supervised tasks and graceful shutdown.

use std::{sync::Arc, time::Duration};

use hublink_core::Clock;
use tokio::{sync::RwLock, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    error::{Result, TaskError},
    processor::WebhookProcessor,
    store::TaskStore,
    worker::{Worker, WorkerConfig, WorkerStats},
};

/// Supervises a fixed set of task workers.
///
/// Spawned workers share one cancellation token; `shutdown_graceful`
/// signals it and waits for in-flight tasks to finish within a timeout.
pub struct WorkerPool {
    store: Arc<dyn TaskStore>,
    processor: Arc<dyn WebhookProcessor>,
    config: WorkerConfig,
    stats: Arc<RwLock<WorkerStats>>,
    cancel: CancellationToken,
    handles: Vec<JoinHandle<Result<()>>>,
    clock: Arc<dyn Clock>,
}

impl WorkerPool {
    /// Creates a pool over the given store and processor.
    pub fn new(
        store: Arc<dyn TaskStore>,
        processor: Arc<dyn WebhookProcessor>,
        config: WorkerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            processor,
            config,
            stats: Arc::new(RwLock::new(WorkerStats::default())),
            cancel: CancellationToken::new(),
            handles: Vec::new(),
            clock,
        }
    }

    fn build_worker(&self, id: usize) -> Worker {
        Worker::new(
            id,
            self.store.clone(),
            self.processor.clone(),
            self.config.clone(),
            self.stats.clone(),
            self.cancel.clone(),
            self.clock.clone(),
        )
    }

    /// Spawns all configured workers and begins processing.
    ///
    /// Returns immediately after spawning. Workers run until cancellation
    /// is requested.
    ///
    /// # Errors
    ///
    /// Currently never fails; the signature allows future validation.
    pub async fn spawn_workers(&mut self) -> Result<()> {
        info!(worker_count = self.config.worker_count, "spawning task workers");

        self.stats.write().await.active_workers = self.config.worker_count;

        for worker_id in 0..self.config.worker_count {
            let worker = self.build_worker(worker_id);
            self.handles.push(tokio::spawn(async move {
                let outcome = worker.run().await;
                if let Err(ref e) = outcome {
                    error!(worker_id, error = %e, "task worker terminated with error");
                }
                outcome
            }));
        }

        info!(spawned_workers = self.handles.len(), "all task workers spawned");
        Ok(())
    }

    /// Gracefully shuts down all workers.
    ///
    /// Signals cancellation and waits for workers to finish their current
    /// batch within `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `TaskError::ShutdownTimeout` if workers do not drain in
    /// time; panicked workers are reported but do not fail the shutdown.
    pub async fn shutdown_graceful(mut self, timeout: Duration) -> Result<()> {
        info!(
            worker_count = self.handles.len(),
            timeout_secs = timeout.as_secs(),
            "stopping worker pool"
        );

        self.cancel.cancel();

        let handles = std::mem::take(&mut self.handles);
        let stats = self.stats.clone();
        let drain = async move {
            let mut panicked = 0usize;
            let total = handles.len();
            for (worker_id, handle) in handles.into_iter().enumerate() {
                match handle.await {
                    Ok(Ok(())) => {},
                    Ok(Err(e)) => {
                        warn!(worker_id, error = %e, "worker reported an error while draining");
                    },
                    Err(join_error) => {
                        error!(worker_id, error = %join_error, "worker panicked while draining");
                        panicked += 1;
                    },
                }
            }
            stats.write().await.active_workers = 0;
            (panicked, total)
        };

        match tokio::time::timeout(timeout, drain).await {
            Ok((panicked, total)) => {
                if panicked > 0 {
                    warn!(panicked, total, "worker pool drained with panicked workers");
                }
                info!("worker pool stopped");
                Ok(())
            },
            Err(_) => {
                error!(
                    timeout_secs = timeout.as_secs(),
                    "worker pool drain exceeded the shutdown timeout"
                );
                Err(TaskError::ShutdownTimeout { timeout })
            },
        }
    }

    /// Returns current pool statistics.
    pub async fn stats(&self) -> WorkerStats {
        self.stats.read().await.clone()
    }

    /// Checks whether any worker task is still running.
    pub fn has_active_workers(&self) -> bool {
        self.handles.iter().any(|h| !h.is_finished())
    }

    /// Processes exactly one batch synchronously with a temporary worker.
    ///
    /// Intended for tests and controlled draining; does not spawn
    /// persistent background workers.
    ///
    /// # Errors
    ///
    /// Returns error if batch processing fails.
    pub async fn process_batch(&self) -> Result<usize> {
        self.build_worker(0).process_batch().await
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        let still_running = self.handles.iter().filter(|h| !h.is_finished()).count();
        if still_running > 0 && !self.cancel.is_cancelled() {
            // Cancel so orphaned workers stop claiming tasks. Callers
            // should prefer shutdown_graceful over dropping the pool.
            error!(still_running, "worker pool dropped while workers were active, cancelling");
            self.cancel.cancel();
        }
    }
}
