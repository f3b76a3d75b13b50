//! Repository for workspace lookups.

use std::sync::Arc;

use sqlx::PgPool;

use crate::{
    error::Result,
    models::{Workspace, WorkspaceId},
};

/// Repository for workspace database operations.
///
/// The callback flow resolves the `state` parameter through this repository
/// before trusting any other input.
pub struct Repository {
    pool: Arc<PgPool>,
}

impl Repository {
    /// Creates a new repository instance.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Finds a workspace by its identifier.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn find_by_id(&self, id: WorkspaceId) -> Result<Option<Workspace>> {
        let workspace = sqlx::query_as::<_, Workspace>(
            r"
            SELECT id, name, url, created_at
            FROM workspaces
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(workspace)
    }

    /// Creates a workspace.
    ///
    /// # Errors
    ///
    /// Returns error if the insert fails or constraints are violated.
    pub async fn create(&self, workspace: &Workspace) -> Result<WorkspaceId> {
        let id = sqlx::query_scalar(
            r"
            INSERT INTO workspaces (id, name, url, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(workspace.id)
        .bind(&workspace.name)
        .bind(&workspace.url)
        .bind(workspace.created_at)
        .fetch_one(&*self.pool)
        .await?;

        Ok(WorkspaceId(id))
    }
}
