//! Asynchronous webhook task processing.
//!
//! The ingress endpoint enqueues validated webhooks through a
//! [`TaskScheduler`] and responds immediately; a bounded worker pool pulls
//! tasks from the durable queue, enforces idempotence by delivery id, and
//! applies retry with exponential backoff before dead-lettering.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod processor;
pub mod retry;
pub mod scheduler;
pub mod store;
pub mod worker;
pub mod worker_pool;

pub use error::{Result, TaskError};
pub use processor::{EventLogProcessor, ProcessError, WebhookDelivery, WebhookProcessor};
pub use retry::{RetryDecision, RetryPolicy};
pub use scheduler::{PostgresTaskScheduler, TaskScheduler};
pub use store::{PostgresTaskStore, TaskStore};
pub use worker::{Worker, WorkerConfig, WorkerStats};
pub use worker_pool::WorkerPool;

/// Default number of concurrent task workers.
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Default maximum tasks claimed per worker batch.
pub const DEFAULT_BATCH_SIZE: usize = 10;
