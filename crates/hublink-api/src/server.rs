//! HTTP server assembly and lifecycle.
//!
//! Builds the Axum router over a shared [`AppState`], stacks the
//! middleware (request-id tagging, tracing, timeout, optional session
//! resolution on the callback route), and runs the listener until a
//! shutdown signal arrives.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    extract::{DefaultBodyLimit, Request},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use hublink_core::{Clock, CredentialStore};
use hublink_platform::{AppUrls, PlatformClient};
use hublink_tasks::TaskScheduler;
use sqlx::PgPool;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;
use uuid::Uuid;

use crate::{handlers, middleware::auth::optional_auth};

/// Shared application state for all handlers.
///
/// Every collaborator sits behind a trait object so tests can run the
/// full router against in-memory stores and a programmable platform
/// stub.
#[derive(Clone)]
pub struct AppState {
    /// Credential and integration persistence.
    pub store: Arc<dyn CredentialStore>,
    /// Outbound client to the App platform.
    pub platform: Arc<dyn PlatformClient>,
    /// Durable task queue for accepted webhooks.
    pub scheduler: Arc<dyn TaskScheduler>,
    /// Redirect target builder for callback outcomes.
    pub urls: AppUrls,
    /// Shared secret for webhook signature verification.
    pub webhook_secret: String,
    /// Time source, swappable in tests.
    pub clock: Arc<dyn Clock>,
    /// Database pool for health probes; `None` when running in-process.
    pub db: Option<PgPool>,
}

/// Assembles the router: health probes, the authorization callback
/// (with optional session resolution), and the webhook ingress.
pub fn create_router(state: AppState) -> Router {
    let health_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/live", get(handlers::liveness_check));

    let callback_routes = Router::new()
        .route("/callback", get(handlers::authorization_callback))
        .layer(middleware::from_fn_with_state(state.clone(), optional_auth));

    // Lift the framework body limit past the handler's own cap; bodies
    // over the cap must reach the handler to get the structured 413.
    let webhook_routes = Router::new()
        .route("/webhooks", post(handlers::receive_webhook))
        .layer(DefaultBodyLimit::max(handlers::webhooks::MAX_PAYLOAD_SIZE + 1024));

    Router::new()
        .merge(health_routes)
        .merge(callback_routes)
        .merge(webhook_routes)
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(tag_request_id))
        .with_state(state)
}

/// Tags every request with a fresh id, echoed back as `X-Request-Id`.
async fn tag_request_id(mut req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    req.extensions_mut().insert(request_id.clone());

    let mut response = next.run(req).await;
    if let Ok(value) = request_id.parse() {
        response.headers_mut().insert("X-Request-Id", value);
    }
    response
}

/// Binds the listener and serves until SIGINT or SIGTERM.
///
/// # Errors
///
/// Returns `std::io::Error` when the bind fails, typically because the
/// port is taken or the interface is unavailable.
pub async fn start_server(state: AppState, addr: SocketAddr) -> Result<(), std::io::Error> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "HTTP server listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    info!("HTTP server stopped");
    Ok(())
}

/// Resolves when either SIGINT (interactive) or SIGTERM (orchestrator)
/// is delivered.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "could not install SIGINT handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!(error = %e, "could not install SIGTERM handler");
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => info!("SIGINT received, shutting down"),
        () = terminate => info!("SIGTERM received, shutting down"),
    }
}
