//! Repository for integrations and their authentication records.
//!
//! The two records are written and deleted together: an integration's
//! `authentication_id` must always resolve to exactly one authentication
//! owned by the same user and workspace, and no authentication may outlive
//! its integration.

use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::Result,
    models::{
        AuthenticationId, Integration, IntegrationAuthentication, IntegrationId,
        IntegrationService, NewAuthentication, NewIntegration,
    },
};

/// Repository for integration database operations.
pub struct Repository {
    pool: Arc<PgPool>,
}

impl Repository {
    /// Creates a new repository instance.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Persists an authentication record and its integration atomically.
    ///
    /// Both inserts run in one transaction keyed by the new records' own
    /// ids; no cross-request locking beyond transactional isolation.
    ///
    /// # Errors
    ///
    /// Returns error if either insert fails; neither row exists afterwards.
    pub async fn create_linked(
        &self,
        authentication: NewAuthentication,
        integration: NewIntegration,
    ) -> Result<(AuthenticationId, IntegrationId)> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let authentication_id = AuthenticationId::new();
        sqlx::query(
            r"
            INSERT INTO integration_authentications (
                id, service, user_id, workspace_id, scopes, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(authentication_id)
        .bind(authentication.service)
        .bind(authentication.user_id)
        .bind(authentication.workspace_id)
        .bind(&authentication.scopes)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let integration_id = IntegrationId::new();
        sqlx::query(
            r"
            INSERT INTO integrations (
                id, service, integration_type, workspace_id, user_id,
                authentication_id, settings, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            ",
        )
        .bind(integration_id)
        .bind(integration.service)
        .bind(integration.integration_type)
        .bind(integration.workspace_id)
        .bind(integration.user_id)
        .bind(authentication_id)
        .bind(sqlx::types::Json(&integration.settings))
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok((authentication_id, integration_id))
    }

    /// Finds an integration by its identifier.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn find_by_id(&self, id: IntegrationId) -> Result<Option<Integration>> {
        let integration = sqlx::query_as::<_, Integration>(
            r"
            SELECT id, service, integration_type, workspace_id, user_id,
                   authentication_id, settings, created_at, updated_at
            FROM integrations
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(integration)
    }

    /// Finds integrations bound to a specific platform installation.
    ///
    /// Multiple rows are possible: racing callbacks for the same workspace
    /// are not deduplicated.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn find_by_installation(
        &self,
        service: IntegrationService,
        installation_id: &str,
    ) -> Result<Vec<Integration>> {
        let integrations = sqlx::query_as::<_, Integration>(
            r"
            SELECT id, service, integration_type, workspace_id, user_id,
                   authentication_id, settings, created_at, updated_at
            FROM integrations
            WHERE service = $1
              AND settings->'installation'->>'id' = $2
            ORDER BY created_at ASC
            ",
        )
        .bind(service)
        .bind(installation_id)
        .fetch_all(&*self.pool)
        .await?;

        Ok(integrations)
    }

    /// Finds the authentication record backing an integration.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn find_authentication(
        &self,
        id: AuthenticationId,
    ) -> Result<Option<IntegrationAuthentication>> {
        let authentication = sqlx::query_as::<_, IntegrationAuthentication>(
            r"
            SELECT id, service, user_id, workspace_id, scopes, created_at
            FROM integration_authentications
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(authentication)
    }

    /// Deletes an integration together with its authentication record.
    ///
    /// # Errors
    ///
    /// Returns error if either delete fails; both rows remain in that case.
    pub async fn delete(&self, id: IntegrationId) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let authentication_id: Option<Uuid> = sqlx::query_scalar(
            r"
            DELETE FROM integrations
            WHERE id = $1
            RETURNING authentication_id
            ",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(authentication_id) = authentication_id {
            sqlx::query("DELETE FROM integration_authentications WHERE id = $1")
                .bind(authentication_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(())
    }
}
