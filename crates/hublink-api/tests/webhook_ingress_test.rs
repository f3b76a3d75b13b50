//! Integration tests for the webhook ingress endpoint.
//!
//! Tests `/webhooks` against the in-memory task queue: signature
//! enforcement over the raw body, the payload size cap, the accepted
//! response shape, and queue failure handling.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use bytes::Bytes;
use hublink_api::{create_router, crypto, AppState};
use hublink_core::TaskStatus;
use hublink_platform::AppUrls;
use hublink_testing::{
    MemoryCredentialStore, MemoryTaskQueue, SignedWebhook, StubPlatformClient, TestClock,
    WebhookRequestBuilder,
};
use proptest::prelude::*;
use serde_json::{json, Value};
use tower::ServiceExt;

const SECRET: &str = "webhook-secret";

fn test_state(queue: Arc<MemoryTaskQueue>) -> AppState {
    AppState {
        store: Arc::new(MemoryCredentialStore::new()),
        platform: Arc::new(StubPlatformClient::new()),
        scheduler: queue,
        urls: AppUrls::new("https://app.example.com"),
        webhook_secret: SECRET.to_string(),
        clock: Arc::new(TestClock::new()),
        db: None,
    }
}

async fn post_webhook(state: AppState, webhook: &SignedWebhook) -> (StatusCode, Value) {
    let mut builder = Request::builder().method("POST").uri("/webhooks");
    for (name, value) in &webhook.headers {
        builder = builder.header(name, value);
    }
    let request = builder.body(Body::from(webhook.body.clone())).expect("build request");

    let response = create_router(state).oneshot(request).await.expect("execute request");

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("read body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("parse response body")
    };
    (status, json)
}

#[tokio::test]
async fn valid_webhook_is_accepted_and_enqueued() {
    let queue = Arc::new(MemoryTaskQueue::new());
    let webhook = WebhookRequestBuilder::new(SECRET)
        .delivery_id("d-accept-1")
        .event_kind("issues")
        .payload(json!({"action": "opened", "issue": {"number": 7}}))
        .build();

    let (status, body) = post_webhook(test_state(queue.clone()), &webhook).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "pending");

    let task_id = body["task_id"].as_str().expect("task_id in response");
    let pending = queue.tasks_in_status(TaskStatus::Pending);
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id.to_string(), task_id);
    assert_eq!(pending[0].header("x-github-delivery"), Some("d-accept-1"));
    assert_eq!(pending[0].header("x-github-event"), Some("issues"));
    assert_eq!(pending[0].body_bytes(), webhook.body);
}

#[tokio::test]
async fn tampered_signature_is_rejected_before_enqueue() {
    let queue = Arc::new(MemoryTaskQueue::new());
    let webhook = WebhookRequestBuilder::new(SECRET).delivery_id("d-tamper-1").build_tampered();

    let (status, body) = post_webhook(test_state(queue.clone()), &webhook).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "E1003");
    assert!(queue.is_empty());
}

#[tokio::test]
async fn missing_signature_header_is_rejected() {
    let queue = Arc::new(MemoryTaskQueue::new());
    let mut webhook = WebhookRequestBuilder::new(SECRET).build();
    webhook.headers.remove("x-hub-signature-256");

    let (status, body) = post_webhook(test_state(queue.clone()), &webhook).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "E1003");
    assert!(queue.is_empty());
}

#[tokio::test]
async fn signature_in_foreign_format_is_rejected() {
    let queue = Arc::new(MemoryTaskQueue::new());
    let mut webhook = WebhookRequestBuilder::new(SECRET).build();
    // Strip the scheme prefix; a bare hex digest must not verify
    let bare = webhook.headers["x-hub-signature-256"]
        .strip_prefix("sha256=")
        .expect("signed header")
        .to_string();
    webhook.headers.insert("x-hub-signature-256".to_string(), bare);

    let (status, _) = post_webhook(test_state(queue.clone()), &webhook).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(queue.is_empty());
}

#[tokio::test]
async fn multi_megabyte_payload_under_cap_is_accepted() {
    // Must pass the router's body limit, not just the handler's check
    let queue = Arc::new(MemoryTaskQueue::new());
    let body = Bytes::from(format!(r#"{{"padding":"{}"}}"#, "x".repeat(3 * 1024 * 1024)));
    let mut webhook = WebhookRequestBuilder::new(SECRET).delivery_id("d-large-1").build();
    webhook
        .headers
        .insert("x-hub-signature-256".to_string(), hublink_testing::sign_payload(SECRET, &body));
    webhook.body = body;

    let (status, json) = post_webhook(test_state(queue.clone()), &webhook).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["status"], "pending");
    assert_eq!(queue.tasks_in_status(TaskStatus::Pending).len(), 1);
}

#[tokio::test]
async fn oversized_payload_is_rejected() {
    let queue = Arc::new(MemoryTaskQueue::new());
    let body = Bytes::from(vec![b'x'; 10 * 1024 * 1024 + 1]);
    let mut webhook = WebhookRequestBuilder::new(SECRET).build();
    webhook
        .headers
        .insert("x-hub-signature-256".to_string(), hublink_testing::sign_payload(SECRET, &body));
    webhook.body = body;

    let (status, json) = post_webhook(test_state(queue.clone()), &webhook).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["error"]["code"], "E1004");
    assert!(queue.is_empty());
}

#[tokio::test]
async fn enqueue_failure_returns_server_error() {
    let queue = Arc::new(MemoryTaskQueue::new());
    queue.fail_enqueue(true);
    let webhook = WebhookRequestBuilder::new(SECRET).delivery_id("d-fail-1").build();

    let (status, body) = post_webhook(test_state(queue.clone()), &webhook).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "E3001");
    assert!(queue.is_empty());
}

proptest! {
    /// Any single hex character changed in a valid signature must fail
    /// verification.
    #[test]
    fn mutated_signature_never_verifies(position in 0..64usize, replacement in "[0-9a-f]") {
        let body = br#"{"action":"opened"}"#;
        let valid = hublink_testing::sign_payload(SECRET, body);
        let digest = valid.strip_prefix("sha256=").expect("prefixed signature");

        let mut chars: Vec<char> = digest.chars().collect();
        prop_assume!(chars[position].to_string() != replacement);
        chars[position] = replacement.chars().next().expect("one char");
        let mutated = format!("sha256={}", chars.iter().collect::<String>());

        prop_assert!(crypto::verify_signature(body, Some(&mutated), SECRET).is_err());
        prop_assert!(crypto::verify_signature(body, Some(&valid), SECRET).is_ok());
    }
}
