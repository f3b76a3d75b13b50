//! Webhook processor contract and delivery parsing.
//!
//! A worker turns a stored task into a [`WebhookDelivery`] by reading the
//! provider headers and parsing the JSON payload, then hands it to the
//! configured [`WebhookProcessor`]. Reprocessing the same delivery id must
//! be a no-op: provider delivery is at-least-once.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use hublink_core::{TaskId, WebhookTask};

/// Header carrying the provider's event type.
pub const EVENT_HEADER: &str = "x-github-event";

/// Header carrying the provider-assigned delivery id.
pub const DELIVERY_HEADER: &str = "x-github-delivery";

/// Processing failure classification.
///
/// The worker retries transient failures with backoff and fails permanent
/// ones immediately, so implementations must classify precisely.
#[derive(Debug, Clone, Error)]
pub enum ProcessError {
    /// The payload can never be processed; do not retry.
    #[error("permanent processing failure: {0}")]
    Permanent(String),

    /// A dependency was unavailable; retry with backoff.
    #[error("transient processing failure: {0}")]
    Transient(String),
}

/// A validated, parsed webhook ready for domain processing.
#[derive(Debug, Clone)]
pub struct WebhookDelivery {
    /// Task instance carrying this delivery.
    pub task_id: TaskId,
    /// Provider-assigned delivery id, the idempotence key.
    pub delivery_id: String,
    /// Provider event type, e.g. `issues` or `installation`.
    pub event_kind: String,
    /// Parsed JSON payload.
    pub payload: serde_json::Value,
    /// Original headers captured at ingestion.
    pub headers: HashMap<String, String>,
}

impl WebhookDelivery {
    /// Builds a delivery from a claimed task.
    ///
    /// # Errors
    ///
    /// Returns `ProcessError::Permanent` when the delivery id or event
    /// header is missing, or the body is not valid JSON. Such tasks are
    /// failed without retry.
    pub fn from_task(task: &WebhookTask) -> Result<Self, ProcessError> {
        let delivery_id = task
            .header(DELIVERY_HEADER)
            .ok_or_else(|| ProcessError::Permanent(format!("missing {DELIVERY_HEADER} header")))?
            .to_string();

        let event_kind = task
            .header(EVENT_HEADER)
            .ok_or_else(|| ProcessError::Permanent(format!("missing {EVENT_HEADER} header")))?
            .to_string();

        let payload: serde_json::Value = serde_json::from_slice(&task.body)
            .map_err(|e| ProcessError::Permanent(format!("malformed JSON payload: {e}")))?;

        Ok(Self {
            task_id: task.id,
            delivery_id,
            event_kind,
            payload,
            headers: task.headers().clone(),
        })
    }
}

/// Consumes parsed webhook deliveries and applies domain effects.
///
/// Implementations are installation-specific; the only contract the worker
/// enforces is error classification and idempotence on the delivery id.
#[async_trait]
pub trait WebhookProcessor: Send + Sync {
    /// Processes one delivery.
    async fn process(&self, delivery: &WebhookDelivery) -> Result<(), ProcessError>;
}

/// Default processor that records event receipt and applies no effects.
///
/// Embedding applications register their own processor for domain side
/// effects; this one keeps the pipeline observable in the meantime.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventLogProcessor;

#[async_trait]
impl WebhookProcessor for EventLogProcessor {
    async fn process(&self, delivery: &WebhookDelivery) -> Result<(), ProcessError> {
        info!(
            delivery_id = %delivery.delivery_id,
            event_kind = %delivery.event_kind,
            "webhook event received"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use chrono::Utc;
    use hublink_core::{NewWebhookTask, TaskStatus};

    use super::*;

    fn task_with(headers: &[(&str, &str)], body: &[u8]) -> WebhookTask {
        let input = NewWebhookTask::new(
            headers.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect(),
            Bytes::copy_from_slice(body),
            Utc::now(),
        );
        WebhookTask {
            id: TaskId::new(),
            status: TaskStatus::Running,
            headers: sqlx::types::Json(input.headers),
            body: input.body.to_vec(),
            payload_size: input.body.len() as i32,
            failure_count: 0,
            received_at: input.received_at,
            last_attempt_at: None,
            next_retry_at: None,
            completed_at: None,
            failed_at: None,
            last_error: None,
        }
    }

    #[test]
    fn delivery_parses_headers_and_payload() {
        let task = task_with(
            &[("x-github-event", "issues"), ("x-github-delivery", "d-1")],
            br#"{"action":"opened"}"#,
        );

        let delivery = WebhookDelivery::from_task(&task).unwrap();
        assert_eq!(delivery.event_kind, "issues");
        assert_eq!(delivery.delivery_id, "d-1");
        assert_eq!(delivery.payload["action"], "opened");
    }

    #[test]
    fn missing_delivery_header_is_permanent() {
        let task = task_with(&[("x-github-event", "issues")], b"{}");

        let err = WebhookDelivery::from_task(&task).unwrap_err();
        assert!(matches!(err, ProcessError::Permanent(_)));
    }

    #[test]
    fn malformed_json_is_permanent() {
        let task = task_with(
            &[("x-github-event", "issues"), ("x-github-delivery", "d-2")],
            b"not json",
        );

        let err = WebhookDelivery::from_task(&task).unwrap_err();
        assert!(matches!(err, ProcessError::Permanent(_)));
    }
}
