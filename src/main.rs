//! Hublink integration gateway service.
//!
//! Main entry point for the Hublink server. Initializes all subsystems
//! and coordinates graceful startup and shutdown: the HTTP surface for
//! the authorization callback and webhook ingress, plus the worker pool
//! draining the durable task queue.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use hublink_api::{AppState, Config};
use hublink_core::{storage::PostgresCredentialStore, RealClock, Storage};
use hublink_platform::{AppUrls, HttpPlatformClient};
use hublink_tasks::{EventLogProcessor, PostgresTaskScheduler, PostgresTaskStore, WorkerPool};
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    init_tracing(&config.rust_log);

    info!("Starting Hublink integration gateway");
    info!(
        database_url = %config.database_url_masked(),
        host = %config.host,
        port = config.port,
        max_connections = config.database_max_connections,
        worker_pool_size = config.worker_pool_size,
        "configuration loaded"
    );

    let db_pool = connect_database(&config).await?;
    info!("Database pool ready");

    ensure_schema(&db_pool).await?;
    info!("Database schema verified");

    let storage = Arc::new(Storage::new(db_pool.clone()));
    let clock = Arc::new(RealClock::new());

    let platform = HttpPlatformClient::new(config.to_platform_config())
        .context("Failed to build platform client")?;

    let state = AppState {
        store: Arc::new(PostgresCredentialStore::new(storage.as_ref().clone())),
        platform: Arc::new(platform),
        scheduler: Arc::new(PostgresTaskScheduler::new(storage.clone())),
        urls: AppUrls::new(config.app_url.clone()),
        webhook_secret: config.webhook_secret.clone(),
        clock: clock.clone(),
        db: Some(db_pool.clone()),
    };

    let mut worker_pool = WorkerPool::new(
        Arc::new(PostgresTaskStore::new(storage)),
        Arc::new(EventLogProcessor),
        config.to_worker_config(),
        clock,
    );
    worker_pool.spawn_workers().await.context("Failed to spawn task workers")?;
    info!(worker_count = config.worker_pool_size, "Task workers started");

    let addr = config.parse_server_addr()?;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = hublink_api::start_server(state, addr).await {
            error!(error = %e, "HTTP server exited with error");
        }
    });

    info!(addr = %addr, "Hublink is ready");

    // start_server resolves once its own signal handler fires
    if let Err(e) = server_handle.await {
        error!(error = %e, "Server task panicked");
    }

    info!("Draining task workers");
    let shutdown_timeout = Duration::from_secs(config.shutdown_timeout_seconds);
    if let Err(e) = worker_pool.shutdown_graceful(shutdown_timeout).await {
        error!(error = %e, "Worker pool shutdown incomplete");
    }

    db_pool.close().await;
    info!("Hublink shutdown complete");
    Ok(())
}

/// Installs the tracing subscriber. `RUST_LOG` in the environment wins
/// over the configured default filter.
fn init_tracing(default_filter: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .or_else(|_| EnvFilter::try_new("info,hublink=debug,tower_http=debug"))
        .expect("invalid log filter");

    let format = fmt::layer().with_target(true).with_file(true).with_line_number(true);

    tracing_subscriber::registry().with(filter).with(format).init();
}

/// Connects to PostgreSQL, retrying a few times so the service survives
/// the database coming up after it.
async fn connect_database(config: &Config) -> Result<sqlx::PgPool> {
    const ATTEMPTS: u32 = 5;
    const PAUSE: Duration = Duration::from_secs(2);

    let options = || {
        PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connection_timeout))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
    };

    let mut attempt = 0;
    loop {
        attempt += 1;
        match options().connect(&config.database_url).await {
            Ok(pool) => {
                sqlx::query("SELECT 1")
                    .fetch_one(&pool)
                    .await
                    .context("Database reachable but probe query failed")?;
                return Ok(pool);
            },
            Err(_) if attempt < ATTEMPTS => {
                info!(attempt, attempts = ATTEMPTS, "database not reachable yet, retrying");
                tokio::time::sleep(PAUSE).await;
            },
            Err(e) => {
                return Err(e).context("Could not connect to the database");
            },
        }
    }
}

/// Creates the schema the repositories expect.
async fn ensure_schema(pool: &sqlx::PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS workspaces (
            id UUID PRIMARY KEY,
            name TEXT NOT NULL,
            url TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create workspaces table")?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            token_hash TEXT PRIMARY KEY,
            user_id UUID NOT NULL,
            workspace_id UUID NOT NULL REFERENCES workspaces(id),
            expires_at TIMESTAMPTZ NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create sessions table")?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS integration_authentications (
            id UUID PRIMARY KEY,
            service TEXT NOT NULL,
            user_id UUID NOT NULL,
            workspace_id UUID NOT NULL REFERENCES workspaces(id),
            scopes TEXT[] NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create integration_authentications table")?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS integrations (
            id UUID PRIMARY KEY,
            service TEXT NOT NULL,
            integration_type TEXT NOT NULL,
            workspace_id UUID NOT NULL REFERENCES workspaces(id),
            user_id UUID NOT NULL,
            authentication_id UUID NOT NULL REFERENCES integration_authentications(id),
            settings JSONB NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create integrations table")?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_integrations_installation
        ON integrations(service, (settings->'installation'->>'id'))
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create integrations installation index")?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS webhook_tasks (
            id UUID PRIMARY KEY,
            status TEXT NOT NULL,
            headers JSONB NOT NULL,
            body BYTEA NOT NULL,
            payload_size INTEGER NOT NULL,
            failure_count INTEGER NOT NULL DEFAULT 0,
            received_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            last_attempt_at TIMESTAMPTZ,
            next_retry_at TIMESTAMPTZ,
            completed_at TIMESTAMPTZ,
            failed_at TIMESTAMPTZ,
            last_error TEXT
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create webhook_tasks table")?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_webhook_tasks_claimable
        ON webhook_tasks(received_at)
        WHERE status = 'pending'
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create webhook_tasks claim index")?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS processed_deliveries (
            delivery_id TEXT PRIMARY KEY,
            task_id UUID NOT NULL,
            processed_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create processed_deliveries table")?;

    Ok(())
}
