//! In-memory credential store for handler tests.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use chrono::Utc;
use hublink_core::{
    error::{CoreError, Result},
    models::{
        AuthenticationId, Integration, IntegrationAuthentication, IntegrationId,
        IntegrationService, NewAuthentication, NewIntegration, Principal, Workspace, WorkspaceId,
    },
    storage::CredentialStore,
};

/// Credential store backed by hash maps.
///
/// Behaves like the PostgreSQL implementation for the linking flow,
/// including atomic create of the authentication/integration pair. A
/// failure toggle simulates database outages.
#[derive(Default)]
pub struct MemoryCredentialStore {
    workspaces: Mutex<HashMap<WorkspaceId, Workspace>>,
    principals: Mutex<HashMap<String, Principal>>,
    integrations: Mutex<HashMap<IntegrationId, Integration>>,
    authentications: Mutex<HashMap<AuthenticationId, IntegrationAuthentication>>,
    fail_writes: AtomicBool,
}

impl MemoryCredentialStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a workspace.
    pub fn insert_workspace(&self, workspace: Workspace) {
        self.workspaces.lock().unwrap().insert(workspace.id, workspace);
    }

    /// Binds a session token hash to a principal.
    pub fn insert_principal(&self, token_hash: impl Into<String>, principal: Principal) {
        self.principals.lock().unwrap().insert(token_hash.into(), principal);
    }

    /// Makes subsequent writes fail with a database error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of all stored integrations.
    pub fn integrations(&self) -> Vec<Integration> {
        self.integrations.lock().unwrap().values().cloned().collect()
    }

    /// Snapshot of all stored authentication records.
    pub fn authentications(&self) -> Vec<IntegrationAuthentication> {
        self.authentications.lock().unwrap().values().cloned().collect()
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CoreError::Database("simulated write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_workspace(&self, id: WorkspaceId) -> Result<Option<Workspace>> {
        Ok(self.workspaces.lock().unwrap().get(&id).cloned())
    }

    async fn find_principal(&self, token_hash: &str) -> Result<Option<Principal>> {
        Ok(self.principals.lock().unwrap().get(token_hash).copied())
    }

    async fn create_linked(
        &self,
        authentication: NewAuthentication,
        integration: NewIntegration,
    ) -> Result<(AuthenticationId, IntegrationId)> {
        self.check_writable()?;

        let now = Utc::now();
        let authentication_id = AuthenticationId::new();
        let integration_id = IntegrationId::new();

        let auth_record = IntegrationAuthentication {
            id: authentication_id,
            service: authentication.service,
            user_id: authentication.user_id,
            workspace_id: authentication.workspace_id,
            scopes: authentication.scopes,
            created_at: now,
        };

        let integration_record = Integration {
            id: integration_id,
            service: integration.service,
            integration_type: integration.integration_type,
            workspace_id: integration.workspace_id,
            user_id: integration.user_id,
            authentication_id,
            settings: sqlx::types::Json(integration.settings),
            created_at: now,
            updated_at: now,
        };

        self.authentications.lock().unwrap().insert(authentication_id, auth_record);
        self.integrations.lock().unwrap().insert(integration_id, integration_record);

        Ok((authentication_id, integration_id))
    }

    async fn find_integration(&self, id: IntegrationId) -> Result<Option<Integration>> {
        Ok(self.integrations.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_installation(
        &self,
        service: IntegrationService,
        installation_id: &str,
    ) -> Result<Vec<Integration>> {
        Ok(self
            .integrations
            .lock()
            .unwrap()
            .values()
            .filter(|i| i.service == service && i.settings.0.installation.id == installation_id)
            .cloned()
            .collect())
    }

    async fn delete_integration(&self, id: IntegrationId) -> Result<()> {
        self.check_writable()?;

        let removed = self
            .integrations
            .lock()
            .unwrap()
            .remove(&id)
            .ok_or_else(|| CoreError::NotFound(format!("integration {id}")))?;
        self.authentications.lock().unwrap().remove(&removed.authentication_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use hublink_core::models::{
        AccountSummary, InstallationSummary, IntegrationSettings, IntegrationType, UserId,
    };

    use super::*;

    fn new_pair(workspace_id: WorkspaceId, installation_id: &str) -> (NewAuthentication, NewIntegration) {
        let user_id = UserId::new();
        let authentication = NewAuthentication {
            service: IntegrationService::Github,
            user_id,
            workspace_id,
            scopes: vec!["issues:write".to_string()],
        };
        let integration = NewIntegration {
            service: IntegrationService::Github,
            integration_type: IntegrationType::Embed,
            workspace_id,
            user_id,
            settings: IntegrationSettings {
                installation: InstallationSummary {
                    id: installation_id.to_string(),
                    account: AccountSummary::default(),
                },
            },
        };
        (authentication, integration)
    }

    #[tokio::test]
    async fn create_linked_stores_both_records() {
        let store = MemoryCredentialStore::new();
        let workspace_id = WorkspaceId::new();
        let (authentication, integration) = new_pair(workspace_id, "42");

        let (auth_id, integration_id) =
            store.create_linked(authentication, integration).await.unwrap();

        let stored = store.find_integration(integration_id).await.unwrap().unwrap();
        assert_eq!(stored.authentication_id, auth_id);
        assert_eq!(stored.settings.0.installation.id, "42");
    }

    #[tokio::test]
    async fn find_by_installation_filters_on_settings() {
        let store = MemoryCredentialStore::new();
        let workspace_id = WorkspaceId::new();

        let (a1, i1) = new_pair(workspace_id, "42");
        let (a2, i2) = new_pair(workspace_id, "99");
        store.create_linked(a1, i1).await.unwrap();
        store.create_linked(a2, i2).await.unwrap();

        let found =
            store.find_by_installation(IntegrationService::Github, "42").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].settings.0.installation.id, "42");
    }

    #[tokio::test]
    async fn delete_removes_integration_and_authentication() {
        let store = MemoryCredentialStore::new();
        let (authentication, integration) = new_pair(WorkspaceId::new(), "42");
        let (_, integration_id) = store.create_linked(authentication, integration).await.unwrap();

        store.delete_integration(integration_id).await.unwrap();

        assert!(store.find_integration(integration_id).await.unwrap().is_none());
        assert!(store.authentications().is_empty());
    }

    #[tokio::test]
    async fn fail_writes_rejects_create() {
        let store = MemoryCredentialStore::new();
        store.fail_writes(true);
        let (authentication, integration) = new_pair(WorkspaceId::new(), "42");

        let err = store.create_linked(authentication, integration).await.unwrap_err();
        assert!(matches!(err, CoreError::Database(_)));
    }
}
