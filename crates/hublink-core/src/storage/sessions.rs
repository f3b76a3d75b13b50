//! Repository for session-based principal resolution.
//!
//! Sessions are looked up by the SHA256 hash of the bearer token, never the
//! token itself. Expired sessions resolve to no principal.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::Result,
    models::{Principal, UserId, WorkspaceId},
};

/// Repository for session database operations.
pub struct Repository {
    pool: Arc<PgPool>,
}

impl Repository {
    /// Creates a new repository instance.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Resolves the principal bound to a session token hash.
    ///
    /// Returns `None` for unknown or expired sessions.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn find_principal(&self, token_hash: &str) -> Result<Option<Principal>> {
        let row: Option<(Uuid, Uuid)> = sqlx::query_as(
            r"
            SELECT user_id, workspace_id
            FROM sessions
            WHERE token_hash = $1
              AND expires_at > NOW()
            ",
        )
        .bind(token_hash)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(row.map(|(user_id, workspace_id)| Principal {
            user_id: UserId(user_id),
            workspace_id: WorkspaceId(workspace_id),
        }))
    }

    /// Creates a session bound to a principal.
    ///
    /// # Errors
    ///
    /// Returns error if the insert fails.
    pub async fn create(
        &self,
        token_hash: &str,
        principal: Principal,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO sessions (token_hash, user_id, workspace_id, expires_at, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            ",
        )
        .bind(token_hash)
        .bind(principal.user_id)
        .bind(principal.workspace_id)
        .bind(expires_at)
        .execute(&*self.pool)
        .await?;

        Ok(())
    }
}
