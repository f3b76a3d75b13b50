//! HTTP client for the external App platform.
//!
//! Performs the OAuth code exchange and the installation listing that the
//! authorization callback composes. Requests carry a timeout so a slow
//! platform stalls only the single callback request, never a lock.

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::{PlatformError, Result};

/// Configuration for the platform HTTP client.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// OAuth application client id.
    pub client_id: String,
    /// OAuth application client secret.
    pub client_secret: String,
    /// URL of the OAuth token endpoint.
    pub token_url: String,
    /// Base URL of the platform REST API.
    pub api_url: String,
    /// Timeout applied to every outbound request.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            token_url: "https://github.com/login/oauth/access_token".to_string(),
            api_url: "https://api.github.com".to_string(),
            timeout: Duration::from_secs(10),
            user_agent: "Hublink/1.0".to_string(),
        }
    }
}

/// Principal obtained from a successful code exchange.
///
/// Opaque to callers; only the platform client dereferences it.
#[derive(Debug, Clone)]
pub struct UserToken {
    /// Bearer token for user-scoped API calls.
    pub access_token: String,
}

/// Account behind an installation, as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InstallationAccount {
    /// Platform-assigned account identifier.
    pub id: Option<i64>,
    /// Account login.
    pub login: Option<String>,
    /// Avatar image URL.
    pub avatar_url: Option<String>,
}

/// A specific grant of the App to an account.
///
/// Transient: fetched during the callback to select which integration to
/// persist, never stored as its own record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Installation {
    /// Platform installation identifier.
    pub id: i64,
    /// Linked account behind the installation.
    pub account: Option<InstallationAccount>,
    /// Map of resource name to granted permission.
    #[serde(default)]
    pub permissions: HashMap<String, String>,
}

impl Installation {
    /// Flattens the permission map into unique `resource:permission`
    /// scope strings.
    ///
    /// Sorted for deterministic output; ordering carries no meaning.
    pub fn scopes(&self) -> Vec<String> {
        let mut scopes: Vec<String> = self
            .permissions
            .iter()
            .map(|(name, permission)| format!("{name}:{permission}"))
            .collect();
        scopes.sort();
        scopes.dedup();
        scopes
    }
}

/// Outbound interface to the App platform.
///
/// The callback handler is written against this trait; tests substitute a
/// stub with programmable installations and failures.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Exchanges an authorization code for a user-scoped principal.
    async fn exchange_code(&self, code: &str) -> Result<UserToken>;

    /// Lists the App installations visible to the principal.
    async fn list_installations(&self, token: &UserToken) -> Result<Vec<Installation>>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InstallationsResponse {
    installations: Vec<Installation>,
}

/// reqwest-backed platform client.
#[derive(Debug, Clone)]
pub struct HttpPlatformClient {
    client: reqwest::Client,
    config: PlatformConfig,
}

impl HttpPlatformClient {
    /// Creates a new platform client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Configuration` if the HTTP client cannot be
    /// built.
    pub fn new(config: PlatformConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(3))
            .build()
            .map_err(|e| PlatformError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    fn map_transport_error(&self, err: reqwest::Error) -> PlatformError {
        if err.is_timeout() {
            PlatformError::Timeout { timeout_ms: self.config.timeout.as_millis() as u64 }
        } else {
            PlatformError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl PlatformClient for HttpPlatformClient {
    #[instrument(skip(self, code))]
    async fn exchange_code(&self, code: &str) -> Result<UserToken> {
        debug!(token_url = %self.config.token_url, "exchanging authorization code");

        let response = self
            .client
            .post(&self.config.token_url)
            .header("accept", "application/json")
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("code", code),
            ])
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PlatformError::Http { status: status.as_u16() });
        }

        let token: TokenResponse =
            response.json().await.map_err(|e| PlatformError::Decode(e.to_string()))?;

        if let Some(error) = token.error {
            let reason = token.error_description.unwrap_or(error);
            return Err(PlatformError::CodeRejected { reason });
        }

        match token.access_token {
            Some(access_token) => Ok(UserToken { access_token }),
            None => Err(PlatformError::Decode("token response missing access_token".to_string())),
        }
    }

    #[instrument(skip(self, token))]
    async fn list_installations(&self, token: &UserToken) -> Result<Vec<Installation>> {
        let url = format!("{}/user/installations", self.config.api_url.trim_end_matches('/'));
        debug!(url = %url, "listing App installations");

        let response = self
            .client
            .get(&url)
            .header("accept", "application/vnd.github+json")
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PlatformError::Http { status: status.as_u16() });
        }

        let body: InstallationsResponse =
            response.json().await.map_err(|e| PlatformError::Decode(e.to_string()))?;

        Ok(body.installations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn installation_with(permissions: &[(&str, &str)]) -> Installation {
        Installation {
            id: 42,
            account: None,
            permissions: permissions
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }

    #[test]
    fn scopes_flatten_permission_map() {
        let installation = installation_with(&[("issues", "write"), ("contents", "read")]);

        let scopes = installation.scopes();
        assert_eq!(scopes.len(), 2);
        assert!(scopes.contains(&"issues:write".to_string()));
        assert!(scopes.contains(&"contents:read".to_string()));
    }

    #[test]
    fn scopes_are_unique() {
        let installation = installation_with(&[("issues", "write")]);

        let scopes = installation.scopes();
        assert_eq!(scopes, vec!["issues:write".to_string()]);
    }

    #[test]
    fn scopes_empty_for_no_permissions() {
        let installation = installation_with(&[]);
        assert!(installation.scopes().is_empty());
    }

    #[test]
    fn installation_deserializes_from_platform_shape() {
        let json = serde_json::json!({
            "id": 42,
            "account": { "id": 7, "login": "octocat", "avatar_url": "https://example.com/a.png" },
            "permissions": { "issues": "write", "contents": "read" }
        });

        let installation: Installation = serde_json::from_value(json).unwrap();
        assert_eq!(installation.id, 42);
        assert_eq!(installation.account.as_ref().unwrap().login.as_deref(), Some("octocat"));
        assert_eq!(installation.permissions.len(), 2);
    }
}
