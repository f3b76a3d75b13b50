//! Webhook ingestion handler with signature validation and enqueue.
//!
//! Verifies the HMAC signature over the raw body, enqueues a durable task,
//! and responds `202 Accepted` before any processing happens. Idempotence
//! is the worker's job; the ingress accepts duplicates and lets the
//! processed-delivery ledger collapse them later.

use std::collections::HashMap;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use hublink_core::{GatewayError, NewWebhookTask};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::crypto::{verify_signature, SIGNATURE_HEADER};
use crate::server::AppState;

/// Maximum accepted payload size.
///
/// The router's body limit sits above this value so the handler sees
/// oversized bodies and can answer with the standard error shape.
pub const MAX_PAYLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Response from successful webhook acceptance.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Identifier of the enqueued task
    pub task_id: String,
    /// Queue status at acceptance time, always `pending`
    pub status: String,
}

/// Error response with code and message.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error details including code and message
    pub error: ErrorDetail,
}

/// Detailed error information.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Error code from our taxonomy (E1001-E3004)
    pub code: String,
    /// Human-readable error description
    pub message: String,
}

/// Accepts a webhook for asynchronous processing.
///
/// # Errors
///
/// Returns appropriate HTTP status codes:
/// - 401: Missing or invalid signature
/// - 413: Payload too large (>10MB)
/// - 500: Task queue unavailable
#[instrument(
    name = "receive_webhook",
    skip(state, headers, body),
    fields(
        content_length = headers.get("content-length").and_then(|v| v.to_str().ok()).unwrap_or("unknown"),
        delivery_id = headers.get("x-github-delivery").and_then(|v| v.to_str().ok()).unwrap_or("none"),
        event_kind = headers.get("x-github-event").and_then(|v| v.to_str().ok()).unwrap_or("none"),
    )
)]
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if body.len() > MAX_PAYLOAD_SIZE {
        warn!(payload_size = body.len(), limit = MAX_PAYLOAD_SIZE, "payload exceeds size limit");
        return create_error_response(
            StatusCode::PAYLOAD_TOO_LARGE,
            &GatewayError::PayloadTooLarge { size_bytes: body.len() },
        );
    }

    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    if let Err(e) = verify_signature(&body, signature, &state.webhook_secret) {
        warn!(error = %e, "webhook signature rejected");
        return create_error_response(
            StatusCode::UNAUTHORIZED,
            &GatewayError::InvalidSignature { reason: e.to_string() },
        );
    }

    let task = NewWebhookTask::new(extract_headers(&headers), body, state.clock.now_utc());

    match state.scheduler.schedule(task).await {
        Ok(task_id) => {
            info!(task_id = %task_id, "webhook accepted");
            (
                StatusCode::ACCEPTED,
                Json(WebhookResponse {
                    task_id: task_id.to_string(),
                    status: "pending".to_string(),
                }),
            )
                .into_response()
        },
        Err(e) => {
            error!(error = %e, "failed to enqueue webhook task");
            create_error_response(StatusCode::INTERNAL_SERVER_ERROR, &GatewayError::QueueUnavailable)
        },
    }
}

/// Extracts headers into a HashMap for storage.
///
/// Header names are lowercased by the HTTP layer already; values that are
/// not valid UTF-8 are dropped rather than failing the request.
fn extract_headers(headers: &HeaderMap) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for (name, value) in headers {
        if let Ok(value_str) = value.to_str() {
            map.insert(name.as_str().to_string(), value_str.to_string());
        }
    }
    map
}

/// Creates a standardized error response.
fn create_error_response(status: StatusCode, error: &GatewayError) -> Response {
    let error_response = ErrorResponse {
        error: ErrorDetail { code: error.code().to_string(), message: error.to_string() },
    };

    (status, Json(error_response)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_response_includes_code() {
        let error = GatewayError::PayloadTooLarge { size_bytes: 11_000_000 };
        let response = create_error_response(StatusCode::PAYLOAD_TOO_LARGE, &error);

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn headers_extraction_preserves_all_values() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", "application/json".parse().unwrap());
        headers.insert("x-github-delivery", "d-123".parse().unwrap());

        let extracted = extract_headers(&headers);

        assert_eq!(extracted.get("content-type").unwrap(), "application/json");
        assert_eq!(extracted.get("x-github-delivery").unwrap(), "d-123");
    }
}
