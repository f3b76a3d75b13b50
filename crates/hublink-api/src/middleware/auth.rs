//! Optional session authentication for the authorization callback.
//!
//! The callback serves both signed-in and anonymous requests, so this
//! middleware never rejects a missing credential. When a bearer token is
//! present it is hashed with SHA-256 and resolved to a principal through
//! the credential store; the handler receives `Option<Principal>` and
//! decides between the linking flow and the apex redirect.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use hublink_core::Principal;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::server::AppState;

/// Extracts the session token from the Authorization header.
///
/// Supports bearer token format: `Bearer <token>`.
fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(String::from)
}

/// Hashes a session token for storage lookup.
///
/// Only the hash is persisted; a leaked sessions table does not leak
/// usable tokens.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Axum middleware resolving an optional principal from the session.
///
/// Inserts `Option<Principal>` into request extensions. A missing or
/// unknown token yields `None`; only a storage failure produces an error
/// response.
pub async fn optional_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let principal = match extract_session_token(req.headers()) {
        Some(token) => {
            let token_hash = hash_token(&token);
            match state.store.find_principal(&token_hash).await {
                Ok(principal) => principal,
                Err(e) => {
                    warn!(error = %e, "session lookup failed");
                    return Err(
                        (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
                    );
                },
            }
        },
        None => None,
    };

    req.extensions_mut().insert::<Option<Principal>>(principal);

    Ok(next.run(req).await)
}
