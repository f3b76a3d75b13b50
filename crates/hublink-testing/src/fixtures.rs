//! Fixture builders for workspaces, installations, and signed webhooks.

use std::collections::HashMap;

use bytes::Bytes;
use chrono::Utc;
use hmac::{Hmac, Mac};
use hublink_core::models::{Workspace, WorkspaceId};
use hublink_platform::{Installation, InstallationAccount};
use serde_json::{json, Value};
use sha2::Sha256;

/// Computes the `sha256=<hex>` signature header value for a payload.
pub fn sign_payload(secret: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts any key length");
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// Creates a workspace with a URL derived from its name.
pub fn workspace(name: &str) -> Workspace {
    Workspace {
        id: WorkspaceId::new(),
        name: name.to_string(),
        url: format!("https://{name}.example.com"),
        created_at: Utc::now(),
    }
}

/// Builder for platform installation responses.
pub struct InstallationBuilder {
    id: i64,
    account: Option<InstallationAccount>,
    permissions: HashMap<String, String>,
}

impl InstallationBuilder {
    /// Creates a builder for the given installation id.
    pub fn new(id: i64) -> Self {
        Self { id, account: None, permissions: HashMap::new() }
    }

    /// Sets the account behind the installation.
    pub fn account(mut self, login: &str) -> Self {
        self.account = Some(InstallationAccount {
            id: Some(1000 + self.id),
            login: Some(login.to_string()),
            avatar_url: Some(format!("https://avatars.example.com/{login}.png")),
        });
        self
    }

    /// Grants a permission on a resource.
    pub fn permission(mut self, resource: &str, level: &str) -> Self {
        self.permissions.insert(resource.to_string(), level.to_string());
        self
    }

    /// Builds the installation.
    pub fn build(self) -> Installation {
        Installation { id: self.id, account: self.account, permissions: self.permissions }
    }
}

/// A webhook request ready to POST at the ingress endpoint.
#[derive(Debug, Clone)]
pub struct SignedWebhook {
    /// Request headers, lowercased names, including the signature.
    pub headers: HashMap<String, String>,
    /// Raw body the signature was computed over.
    pub body: Bytes,
}

/// Builder for signed webhook requests.
pub struct WebhookRequestBuilder {
    secret: String,
    delivery_id: String,
    event_kind: String,
    payload: Value,
}

impl WebhookRequestBuilder {
    /// Creates a builder signing with the given secret.
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.to_string(),
            delivery_id: "delivery-0001".to_string(),
            event_kind: "issues".to_string(),
            payload: json!({"action": "opened"}),
        }
    }

    /// Sets the delivery id header.
    pub fn delivery_id(mut self, id: &str) -> Self {
        self.delivery_id = id.to_string();
        self
    }

    /// Sets the event kind header.
    pub fn event_kind(mut self, kind: &str) -> Self {
        self.event_kind = kind.to_string();
        self
    }

    /// Sets the JSON payload.
    pub fn payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Builds the request with a valid signature over the body.
    pub fn build(self) -> SignedWebhook {
        let body = Bytes::from(self.payload.to_string());
        let signature = sign_payload(&self.secret, &body);

        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        headers.insert("x-hub-signature-256".to_string(), signature);
        headers.insert("x-github-delivery".to_string(), self.delivery_id);
        headers.insert("x-github-event".to_string(), self.event_kind);

        SignedWebhook { headers, body }
    }

    /// Builds the request with a signature that does not match the body.
    pub fn build_tampered(self) -> SignedWebhook {
        let mut webhook = self.build();
        webhook.headers.insert(
            "x-hub-signature-256".to_string(),
            format!("sha256={}", "deadbeef".repeat(8)),
        );
        webhook
    }
}
