//! Integration tests for task processing, retry scheduling, and
//! delivery-id idempotence.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use hublink_core::{Clock, NewWebhookTask, TaskStatus};
use hublink_tasks::{
    ProcessError, RetryPolicy, TaskScheduler, TaskStore, WebhookDelivery, WebhookProcessor,
    WorkerConfig, WorkerPool,
};
use hublink_testing::{MemoryTaskQueue, TestClock, WebhookRequestBuilder};

/// Processor that fails transiently a set number of times, then succeeds.
struct FlakyProcessor {
    transient_failures: u32,
    calls: AtomicU32,
}

impl FlakyProcessor {
    fn new(transient_failures: u32) -> Self {
        Self { transient_failures, calls: AtomicU32::new(0) }
    }

    fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WebhookProcessor for FlakyProcessor {
    async fn process(&self, _delivery: &WebhookDelivery) -> std::result::Result<(), ProcessError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.transient_failures {
            Err(ProcessError::Transient("dependency unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Processor that always fails permanently.
struct RejectingProcessor;

#[async_trait]
impl WebhookProcessor for RejectingProcessor {
    async fn process(&self, _delivery: &WebhookDelivery) -> std::result::Result<(), ProcessError> {
        Err(ProcessError::Permanent("unsupported payload".to_string()))
    }
}

fn test_config() -> WorkerConfig {
    WorkerConfig {
        worker_count: 1,
        batch_size: 10,
        poll_interval: Duration::from_millis(50),
        retry_policy: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter_factor: 0.0,
        },
        shutdown_timeout: Duration::from_secs(5),
    }
}

fn signed_task(delivery_id: &str) -> NewWebhookTask {
    let webhook = WebhookRequestBuilder::new("test-secret").delivery_id(delivery_id).build();
    NewWebhookTask::new(webhook.headers, webhook.body, Utc::now())
}

fn pool_over(
    queue: Arc<MemoryTaskQueue>,
    processor: Arc<dyn WebhookProcessor>,
    clock: Arc<TestClock>,
) -> WorkerPool {
    WorkerPool::new(queue, processor, test_config(), clock)
}

#[tokio::test]
async fn successful_task_completes_and_records_delivery() -> Result<()> {
    let queue = Arc::new(MemoryTaskQueue::new());
    let processor = Arc::new(FlakyProcessor::new(0));
    let clock = Arc::new(TestClock::new());

    let id = queue.schedule(signed_task("d-1")).await?;
    let pool = pool_over(queue.clone(), processor.clone(), clock);

    pool.process_batch().await?;

    assert_eq!(queue.find(id).unwrap().status, TaskStatus::Completed);
    assert!(queue.is_delivery_processed("d-1").await?);
    assert_eq!(processor.call_count(), 1);
    Ok(())
}

#[tokio::test]
async fn transient_failure_schedules_retry_then_succeeds() -> Result<()> {
    let queue = Arc::new(MemoryTaskQueue::new());
    let processor = Arc::new(FlakyProcessor::new(1));
    let clock = Arc::new(TestClock::new());

    let id = queue.schedule(signed_task("d-2")).await?;
    let pool = pool_over(queue.clone(), processor.clone(), clock.clone());

    pool.process_batch().await?;

    let task = queue.find(id).unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.failure_count, 1);
    assert!(task.next_retry_at.is_some());

    // Retry is not eligible until its scheduled time has passed
    assert_eq!(pool.process_batch().await?, 0);

    clock.advance(Duration::from_secs(2));
    pool.process_batch().await?;

    assert_eq!(queue.find(id).unwrap().status, TaskStatus::Completed);
    assert_eq!(processor.call_count(), 2);
    Ok(())
}

#[tokio::test]
async fn exhausted_retries_move_task_to_dead_letter() -> Result<()> {
    let queue = Arc::new(MemoryTaskQueue::new());
    let processor = Arc::new(FlakyProcessor::new(u32::MAX));
    let clock = Arc::new(TestClock::new());

    let id = queue.schedule(signed_task("d-3")).await?;
    let pool = pool_over(queue.clone(), processor.clone(), clock.clone());

    // max_attempts is 3: two retries are scheduled, the third failure
    // exhausts the budget
    for _ in 0..3 {
        pool.process_batch().await?;
        clock.advance(Duration::from_secs(120));
    }

    let task = queue.find(id).unwrap();
    assert_eq!(task.status, TaskStatus::DeadLetter);
    assert_eq!(task.failure_count, 3);
    assert_eq!(processor.call_count(), 3);
    assert!(!queue.is_delivery_processed("d-3").await?);
    Ok(())
}

#[tokio::test]
async fn permanent_failure_is_not_retried() -> Result<()> {
    let queue = Arc::new(MemoryTaskQueue::new());
    let clock = Arc::new(TestClock::new());

    let id = queue.schedule(signed_task("d-4")).await?;
    let pool = pool_over(queue.clone(), Arc::new(RejectingProcessor), clock.clone());

    pool.process_batch().await?;

    let task = queue.find(id).unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.failure_count, 1, "permanent failure still counts as an attempt");
    assert_eq!(task.last_error.as_deref(), Some("unsupported payload"));

    clock.advance(Duration::from_secs(600));
    assert_eq!(pool.process_batch().await?, 0);
    Ok(())
}

#[tokio::test]
async fn duplicate_delivery_id_completes_without_reprocessing() -> Result<()> {
    let queue = Arc::new(MemoryTaskQueue::new());
    let processor = Arc::new(FlakyProcessor::new(0));
    let clock = Arc::new(TestClock::new());

    // Provider redelivery: two task instances carrying the same delivery id
    let first = queue.schedule(signed_task("d-5")).await?;
    let pool = pool_over(queue.clone(), processor.clone(), clock);
    pool.process_batch().await?;

    let second = queue.schedule(signed_task("d-5")).await?;
    pool.process_batch().await?;

    assert_eq!(queue.find(first).unwrap().status, TaskStatus::Completed);
    assert_eq!(queue.find(second).unwrap().status, TaskStatus::Completed);
    assert_eq!(processor.call_count(), 1, "processor must run once per delivery id");
    Ok(())
}

#[tokio::test]
async fn task_without_delivery_header_fails_permanently() -> Result<()> {
    let queue = Arc::new(MemoryTaskQueue::new());
    let processor = Arc::new(FlakyProcessor::new(0));
    let clock = Arc::new(TestClock::new());

    let mut headers = HashMap::new();
    headers.insert("x-github-event".to_string(), "issues".to_string());
    let id = queue
        .schedule(NewWebhookTask::new(headers, Bytes::from_static(b"{}"), Utc::now()))
        .await?;

    let pool = pool_over(queue.clone(), processor.clone(), clock);
    pool.process_batch().await?;

    assert_eq!(queue.find(id).unwrap().status, TaskStatus::Failed);
    assert_eq!(processor.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn malformed_json_body_fails_permanently() -> Result<()> {
    let queue = Arc::new(MemoryTaskQueue::new());
    let processor = Arc::new(FlakyProcessor::new(0));
    let clock = Arc::new(TestClock::new());

    let webhook = WebhookRequestBuilder::new("test-secret").delivery_id("d-6").build();
    let id = queue
        .schedule(NewWebhookTask::new(webhook.headers, Bytes::from_static(b"not json"), Utc::now()))
        .await?;

    let pool = pool_over(queue.clone(), processor.clone(), clock);
    pool.process_batch().await?;

    let task = queue.find(id).unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.last_error.unwrap().contains("malformed JSON"));
    Ok(())
}

#[tokio::test]
async fn worker_pool_drains_queue_and_shuts_down() -> Result<()> {
    let queue = Arc::new(MemoryTaskQueue::new());
    let processor = Arc::new(FlakyProcessor::new(0));

    for i in 0..5 {
        queue.schedule(signed_task(&format!("d-pool-{i}"))).await?;
    }

    let config = WorkerConfig { worker_count: 2, ..test_config() };
    let clock: Arc<dyn Clock> = Arc::new(TestClock::new());
    let mut pool = WorkerPool::new(queue.clone(), processor.clone(), config, clock);

    pool.spawn_workers().await?;
    assert!(pool.has_active_workers());

    // Spawned workers poll the queue until every task is drained
    tokio::time::timeout(Duration::from_secs(5), async {
        while processor.call_count() < 5 {
            tokio::task::yield_now().await;
        }
    })
    .await?;

    pool.shutdown_graceful(Duration::from_secs(5)).await?;

    assert_eq!(queue.tasks_in_status(TaskStatus::Completed).len(), 5);
    Ok(())
}

#[tokio::test]
async fn shutdown_without_spawn_completes_immediately() -> Result<()> {
    let queue = Arc::new(MemoryTaskQueue::new());
    let clock: Arc<dyn Clock> = Arc::new(TestClock::new());
    let pool = WorkerPool::new(queue, Arc::new(RejectingProcessor), test_config(), clock);

    pool.shutdown_graceful(Duration::from_millis(10)).await?;
    Ok(())
}
