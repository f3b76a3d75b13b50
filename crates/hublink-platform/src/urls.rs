//! Redirect target builder for the authorization flow.
//!
//! Every callback path terminates in one of these URLs: the canonical
//! success page, an error page parameterized by a reason code, or the
//! install-request page shown when an installation needs approval.

/// Builds the platform-defined redirect targets under the app base URL.
#[derive(Debug, Clone)]
pub struct AppUrls {
    base_url: String,
}

impl AppUrls {
    /// Path of the integration settings page all targets live under.
    pub const SETTINGS_PATH: &'static str = "/settings/integrations/github";

    /// Creates a URL builder rooted at the app base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url }
    }

    /// Canonical success URL shown after a completed authorization.
    pub fn success_url(&self) -> String {
        format!("{}{}", self.base_url, Self::SETTINGS_PATH)
    }

    /// Error URL carrying a reason code such as `unauthenticated`.
    pub fn error_url(&self, reason: &str) -> String {
        format!("{}{}?error={reason}", self.base_url, Self::SETTINGS_PATH)
    }

    /// URL shown when the installation was requested but needs approval.
    pub fn install_request_url(&self) -> String {
        format!("{}{}?install_request=true", self.base_url, Self::SETTINGS_PATH)
    }

    /// Workspace-host callback URL carrying the original query string.
    ///
    /// Used for the anonymous pre-login flow: the apex host forwards the
    /// untouched callback query to the workspace host where a session
    /// exists.
    pub fn workspace_callback_url(workspace_url: &str, query: &str) -> String {
        let base = workspace_url.trim_end_matches('/');
        format!("{base}/api/callback?{query}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_url_is_settings_page() {
        let urls = AppUrls::new("https://app.example.com");
        assert_eq!(urls.success_url(), "https://app.example.com/settings/integrations/github");
    }

    #[test]
    fn error_url_carries_reason() {
        let urls = AppUrls::new("https://app.example.com/");
        assert_eq!(
            urls.error_url("unauthenticated"),
            "https://app.example.com/settings/integrations/github?error=unauthenticated"
        );
    }

    #[test]
    fn install_request_url_flags_request() {
        let urls = AppUrls::new("https://app.example.com");
        assert!(urls.install_request_url().ends_with("?install_request=true"));
    }

    #[test]
    fn workspace_callback_preserves_query() {
        let url = AppUrls::workspace_callback_url(
            "https://team.example.com/",
            "code=abc&state=team-1",
        );
        assert_eq!(url, "https://team.example.com/api/callback?code=abc&state=team-1");
    }
}
