//! Database access layer implementing the repository pattern.
//!
//! Repositories translate between domain models and database schemas so the
//! schema can evolve without breaking domain logic. All database operations
//! go through this module; direct SQL elsewhere is forbidden.
//!
//! The [`CredentialStore`] trait is the persistence boundary consumed by the
//! authorization callback: the production implementation is backed by these
//! repositories, tests substitute an in-memory store.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;

pub mod integrations;
pub mod sessions;
pub mod webhook_tasks;
pub mod workspaces;

use crate::{
    error::Result,
    models::{
        AuthenticationId, Integration, IntegrationId, IntegrationService, NewAuthentication,
        NewIntegration, Principal, Workspace, WorkspaceId,
    },
};

/// Container for all repository instances providing unified database access.
#[derive(Clone)]
pub struct Storage {
    /// Repository for workspace lookups.
    pub workspaces: Arc<workspaces::Repository>,

    /// Repository for session-based principal resolution.
    pub sessions: Arc<sessions::Repository>,

    /// Repository for integrations and their authentication records.
    pub integrations: Arc<integrations::Repository>,

    /// Repository for the durable webhook task queue.
    pub webhook_tasks: Arc<webhook_tasks::Repository>,
}

impl Storage {
    /// Creates a new storage instance with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        let pool = Arc::new(pool);
        Self {
            workspaces: Arc::new(workspaces::Repository::new(pool.clone())),
            sessions: Arc::new(sessions::Repository::new(pool.clone())),
            integrations: Arc::new(integrations::Repository::new(pool.clone())),
            webhook_tasks: Arc::new(webhook_tasks::Repository::new(pool)),
        }
    }
}

/// Persistence boundary for integration credentials and bindings.
///
/// The callback handler is written against this trait so the linking flow
/// can run against any storage engine. Association traversal is explicit:
/// lookups go through `find_*` methods, never implicit object graphs.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Resolves a workspace by its identifier.
    async fn find_workspace(&self, id: WorkspaceId) -> Result<Option<Workspace>>;

    /// Resolves the principal bound to a session token hash.
    async fn find_principal(&self, token_hash: &str) -> Result<Option<Principal>>;

    /// Persists an authentication record and its integration atomically.
    ///
    /// Either both rows exist after this call or neither does. The
    /// integration's `authentication_id` is assigned inside the
    /// transaction.
    async fn create_linked(
        &self,
        authentication: NewAuthentication,
        integration: NewIntegration,
    ) -> Result<(AuthenticationId, IntegrationId)>;

    /// Finds an integration by its identifier.
    async fn find_integration(&self, id: IntegrationId) -> Result<Option<Integration>>;

    /// Finds integrations bound to a specific platform installation.
    async fn find_by_installation(
        &self,
        service: IntegrationService,
        installation_id: &str,
    ) -> Result<Vec<Integration>>;

    /// Deletes an integration together with its authentication record.
    ///
    /// Both rows are removed in one transaction so no orphaned
    /// authentication keeps referencing live credentials.
    async fn delete_integration(&self, id: IntegrationId) -> Result<()>;
}

/// PostgreSQL-backed credential store delegating to the repositories.
#[derive(Clone)]
pub struct PostgresCredentialStore {
    storage: Storage,
}

impl PostgresCredentialStore {
    /// Creates a credential store over the given storage layer.
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl CredentialStore for PostgresCredentialStore {
    async fn find_workspace(&self, id: WorkspaceId) -> Result<Option<Workspace>> {
        self.storage.workspaces.find_by_id(id).await
    }

    async fn find_principal(&self, token_hash: &str) -> Result<Option<Principal>> {
        self.storage.sessions.find_principal(token_hash).await
    }

    async fn create_linked(
        &self,
        authentication: NewAuthentication,
        integration: NewIntegration,
    ) -> Result<(AuthenticationId, IntegrationId)> {
        self.storage.integrations.create_linked(authentication, integration).await
    }

    async fn find_integration(&self, id: IntegrationId) -> Result<Option<Integration>> {
        self.storage.integrations.find_by_id(id).await
    }

    async fn find_by_installation(
        &self,
        service: IntegrationService,
        installation_id: &str,
    ) -> Result<Vec<Integration>> {
        self.storage.integrations.find_by_installation(service, installation_id).await
    }

    async fn delete_integration(&self, id: IntegrationId) -> Result<()> {
        self.storage.integrations.delete(id).await
    }
}
