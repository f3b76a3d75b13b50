//! Programmable stub for the outbound platform client.

use std::sync::Mutex;

use async_trait::async_trait;
use hublink_platform::{
    error::{PlatformError, Result},
    Installation, PlatformClient, UserToken,
};

/// Failure mode injected into a stub call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StubFailure {
    /// Reject the authorization code.
    CodeRejected,
    /// Time out the request.
    Timeout,
    /// Return an HTTP error status.
    Http(u16),
}

impl StubFailure {
    fn to_error(self) -> PlatformError {
        match self {
            Self::CodeRejected => {
                PlatformError::CodeRejected { reason: "bad_verification_code".to_string() }
            },
            Self::Timeout => PlatformError::Timeout { timeout_ms: 10_000 },
            Self::Http(status) => PlatformError::Http { status },
        }
    }
}

/// Platform client whose responses are set up by the test.
#[derive(Default)]
pub struct StubPlatformClient {
    installations: Mutex<Vec<Installation>>,
    exchange_failure: Mutex<Option<StubFailure>>,
    listing_failure: Mutex<Option<StubFailure>>,
    exchanged_codes: Mutex<Vec<String>>,
}

impl StubPlatformClient {
    /// Creates a stub with no installations and no failures.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a stub that returns the given installations.
    pub fn with_installations(installations: Vec<Installation>) -> Self {
        let stub = Self::new();
        *stub.installations.lock().unwrap() = installations;
        stub
    }

    /// Adds an installation to the listing response.
    pub fn push_installation(&self, installation: Installation) {
        self.installations.lock().unwrap().push(installation);
    }

    /// Makes `exchange_code` fail.
    pub fn fail_exchange(&self, failure: StubFailure) {
        *self.exchange_failure.lock().unwrap() = Some(failure);
    }

    /// Makes `list_installations` fail.
    pub fn fail_listing(&self, failure: StubFailure) {
        *self.listing_failure.lock().unwrap() = Some(failure);
    }

    /// Authorization codes the stub has seen, in call order.
    pub fn exchanged_codes(&self) -> Vec<String> {
        self.exchanged_codes.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlatformClient for StubPlatformClient {
    async fn exchange_code(&self, code: &str) -> Result<UserToken> {
        self.exchanged_codes.lock().unwrap().push(code.to_string());

        if let Some(failure) = *self.exchange_failure.lock().unwrap() {
            return Err(failure.to_error());
        }

        Ok(UserToken { access_token: format!("stub-token-for-{code}") })
    }

    async fn list_installations(&self, _token: &UserToken) -> Result<Vec<Installation>> {
        if let Some(failure) = *self.listing_failure.lock().unwrap() {
            return Err(failure.to_error());
        }

        Ok(self.installations.lock().unwrap().clone())
    }
}
