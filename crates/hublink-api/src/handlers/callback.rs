//! Authorization callback handler linking a workspace to an installation.
//!
//! The platform redirects the user here after the App install/authorize
//! screen. Every branch terminates in a redirect; no failure surfaces as
//! an error page or leaks platform detail. Nothing is persisted unless
//! the whole flow succeeds, so an abandoned or failed callback leaves no
//! partial state behind.

use axum::{
    extract::{Query, RawQuery, State},
    response::{IntoResponse, Redirect, Response},
    Extension,
};
use hublink_core::{
    models::{
        AccountSummary, InstallationSummary, IntegrationService, IntegrationSettings,
        IntegrationType, NewAuthentication, NewIntegration, Workspace, WorkspaceId,
    },
    GatewayError, Principal,
};
use hublink_platform::{AppUrls, Installation};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::server::AppState;

/// Reason code used for every failure redirect.
///
/// The platform-facing contract exposes a single generic reason so the
/// redirect target cannot be used to probe which step failed.
const UNAUTHENTICATED: &str = "unauthenticated";

/// `setup_action` value sent when the installation awaits approval.
const SETUP_ACTION_REQUEST: &str = "request";

/// Query parameters of the authorization callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    /// Authorization code to exchange, absent on error callbacks.
    pub code: Option<String>,
    /// Workspace identifier round-tripped through the platform.
    pub state: Option<String>,
    /// Platform-reported error, e.g. user cancelled the grant.
    pub error: Option<String>,
    /// Installation selected during the grant.
    pub installation_id: Option<String>,
    /// Install flow outcome, `request` when approval is pending.
    pub setup_action: Option<String>,
}

/// Handles `GET /callback`.
#[instrument(
    name = "authorization_callback",
    skip(state, query, raw_query, principal),
    fields(
        state_param = query.state.as_deref().unwrap_or("none"),
        installation_id = query.installation_id.as_deref().unwrap_or("none"),
        setup_action = query.setup_action.as_deref().unwrap_or("none"),
    )
)]
pub async fn authorization_callback(
    State(state): State<AppState>,
    Extension(principal): Extension<Option<Principal>>,
    RawQuery(raw_query): RawQuery,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let workspace = match resolve_workspace(&state, query.state.as_deref()).await {
        Ok(workspace) => workspace,
        Err(e) => {
            warn!(code = e.code(), error = %e, "callback rejected");
            return redirect(&state.urls.error_url(UNAUTHENTICATED));
        },
    };

    // Anonymous pre-login flow: hand the untouched query to the workspace
    // host where a session exists
    let Some(principal) = principal else {
        let target = AppUrls::workspace_callback_url(
            &workspace.url,
            raw_query.as_deref().unwrap_or(""),
        );
        info!(workspace_id = %workspace.id, "anonymous callback, redirecting to workspace host");
        return redirect(&target);
    };

    if principal.workspace_id != workspace.id {
        warn!(
            workspace_id = %workspace.id,
            principal_workspace_id = %principal.workspace_id,
            "principal workspace does not match state"
        );
        return redirect(&state.urls.error_url(UNAUTHENTICATED));
    }

    if let Some(error) = query.error.as_deref() {
        info!(platform_error = error, "platform reported callback error");
        return redirect(&state.urls.error_url(error));
    }

    if query.setup_action.as_deref() == Some(SETUP_ACTION_REQUEST) {
        info!(workspace_id = %workspace.id, "installation requested, awaiting approval");
        return redirect(&state.urls.install_request_url());
    }

    match link_installation(&state, &workspace, principal, &query).await {
        Ok(installation_id) => {
            info!(
                workspace_id = %workspace.id,
                installation_id = %installation_id,
                "integration linked"
            );
            redirect(&state.urls.success_url())
        },
        Err(e) => {
            warn!(code = e.code(), error = %e, "linking failed");
            redirect(&state.urls.error_url(UNAUTHENTICATED))
        },
    }
}

async fn resolve_workspace(
    state: &AppState,
    state_param: Option<&str>,
) -> Result<Workspace, GatewayError> {
    let raw = state_param.ok_or(GatewayError::UnknownWorkspace)?;
    let id: WorkspaceId =
        raw.parse::<uuid::Uuid>().map(WorkspaceId::from).map_err(|_| GatewayError::UnknownWorkspace)?;

    state
        .store
        .find_workspace(id)
        .await
        .map_err(GatewayError::Core)?
        .ok_or(GatewayError::UnknownWorkspace)
}

/// Runs the code exchange, installation selection, and atomic persist.
///
/// Returns the linked installation id. Any error leaves the store
/// untouched: both writes happen in one transaction at the very end.
async fn link_installation(
    state: &AppState,
    workspace: &Workspace,
    principal: Principal,
    query: &CallbackQuery,
) -> Result<String, GatewayError> {
    let code = query.code.as_deref().ok_or(GatewayError::MissingCode)?;
    let installation_id = query
        .installation_id
        .as_deref()
        .ok_or_else(|| GatewayError::InstallationMismatch { installation_id: "none".to_string() })?;

    let token = state.platform.exchange_code(code).await.map_err(|e| {
        GatewayError::CodeExchangeFailed { reason: e.to_string() }
    })?;

    let installations = state.platform.list_installations(&token).await.map_err(|e| {
        GatewayError::InstallationListingFailed { reason: e.to_string() }
    })?;

    let installation = installations
        .iter()
        .find(|i| i.id.to_string() == installation_id)
        .ok_or_else(|| GatewayError::InstallationMismatch {
            installation_id: installation_id.to_string(),
        })?;

    let scopes = installation.scopes();

    let authentication = NewAuthentication {
        service: IntegrationService::Github,
        user_id: principal.user_id,
        workspace_id: workspace.id,
        scopes,
    };

    let integration = NewIntegration {
        service: IntegrationService::Github,
        integration_type: IntegrationType::Embed,
        workspace_id: workspace.id,
        user_id: principal.user_id,
        settings: IntegrationSettings { installation: summarize(installation) },
    };

    state
        .store
        .create_linked(authentication, integration)
        .await
        .map_err(|_| GatewayError::PersistenceFailed { workspace_id: workspace.id })?;

    Ok(installation.id.to_string())
}

/// Projects a transient installation onto the persisted settings shape.
fn summarize(installation: &Installation) -> InstallationSummary {
    let account = installation.account.as_ref().map_or_else(AccountSummary::default, |a| {
        AccountSummary { id: a.id, name: a.login.clone(), avatar_url: a.avatar_url.clone() }
    });

    InstallationSummary { id: installation.id.to_string(), account }
}

fn redirect(target: &str) -> Response {
    Redirect::to(target).into_response()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use hublink_platform::InstallationAccount;

    use super::*;

    #[test]
    fn summarize_carries_account_fields() {
        let installation = Installation {
            id: 42,
            account: Some(InstallationAccount {
                id: Some(7),
                login: Some("acme".to_string()),
                avatar_url: Some("https://avatars.example.com/acme.png".to_string()),
            }),
            permissions: HashMap::new(),
        };

        let summary = summarize(&installation);

        assert_eq!(summary.id, "42");
        assert_eq!(summary.account.id, Some(7));
        assert_eq!(summary.account.name.as_deref(), Some("acme"));
    }

    #[test]
    fn summarize_tolerates_missing_account() {
        let installation = Installation { id: 9, account: None, permissions: HashMap::new() };

        let summary = summarize(&installation);

        assert_eq!(summary.id, "9");
        assert_eq!(summary.account, AccountSummary::default());
    }
}
