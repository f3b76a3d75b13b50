//! Liveness, readiness, and health endpoints with a database probe.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, instrument};

use crate::server::AppState;

/// Body returned by the `/health` and `/ready` endpoints.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall service health status.
    pub status: HealthStatus,
    /// When the check was performed.
    pub timestamp: DateTime<Utc>,
    /// Individual component checks.
    pub checks: HealthChecks,
    /// Service version.
    pub version: String,
}

/// Overall health status.
#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All systems operational.
    Healthy,
    /// Critical systems failing.
    Unhealthy,
}

/// Individual component check results.
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    /// Database connectivity.
    pub database: ComponentHealth,
}

/// Health of a single component.
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    /// Component status.
    pub status: ComponentStatus,
    /// Error detail when down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Component-level status.
#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Component is reachable.
    Up,
    /// Component is failing.
    Down,
}

/// Reports overall service health, including a database probe.
///
/// Load balancers poll this frequently, so the probe stays cheap.
#[instrument(name = "health_check", skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Response {
    let database = check_database(&state).await;

    let status = match database.status {
        ComponentStatus::Up => HealthStatus::Healthy,
        ComponentStatus::Down => HealthStatus::Unhealthy,
    };

    let status_code = match status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    let response = HealthResponse {
        status,
        timestamp: state.clock.now_utc(),
        checks: HealthChecks { database },
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    debug!(status = ?response.status, "health check completed");

    (status_code, Json(response)).into_response()
}

async fn check_database(state: &AppState) -> ComponentHealth {
    let Some(pool) = &state.db else {
        // No pool wired means storage is in-process, nothing to probe
        return ComponentHealth { status: ComponentStatus::Up, message: None };
    };

    match sqlx::query("SELECT 1").execute(pool).await {
        Ok(_) => ComponentHealth { status: ComponentStatus::Up, message: None },
        Err(e) => {
            error!(error = %e, "database health check failed");
            ComponentHealth {
                status: ComponentStatus::Down,
                message: Some(format!("database unreachable: {e}")),
            }
        },
    }
}

/// Readiness check endpoint for orchestration probes.
#[instrument(name = "readiness_check", skip(state))]
pub async fn readiness_check(State(state): State<AppState>) -> Response {
    health_check(State(state)).await
}

/// Liveness check endpoint.
///
/// Minimal check that does not touch external dependencies; only
/// confirms the HTTP server is responding.
#[instrument(name = "liveness_check", skip(state))]
pub async fn liveness_check(State(state): State<AppState>) -> Response {
    let response = serde_json::json!({
        "status": "alive",
        "timestamp": state.clock.now_utc(),
        "service": "hublink-api"
    });

    (StatusCode::OK, Json(response)).into_response()
}
