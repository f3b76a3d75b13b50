//! Error types for outbound platform calls.

use thiserror::Error;

/// Result type alias for platform operations.
pub type Result<T> = std::result::Result<T, PlatformError>;

/// Errors from the OAuth exchange and installation listing calls.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The request exceeded its timeout.
    ///
    /// The callback treats this like any other platform failure and
    /// redirects to the error target instead of hanging the request.
    #[error("platform request timed out after {timeout_ms}ms")]
    Timeout {
        /// Timeout that was exceeded, in milliseconds.
        timeout_ms: u64,
    },

    /// The platform returned a non-success HTTP status.
    #[error("platform returned HTTP {status}")]
    Http {
        /// Status code of the response.
        status: u16,
    },

    /// The platform rejected the authorization code.
    #[error("authorization code rejected: {reason}")]
    CodeRejected {
        /// Platform-reported reason, e.g. `bad_verification_code`.
        reason: String,
    },

    /// The response body could not be decoded.
    #[error("failed to decode platform response: {0}")]
    Decode(String),

    /// Network-level transport failure.
    #[error("platform request failed: {0}")]
    Transport(String),

    /// Client construction failed.
    #[error("invalid platform client configuration: {0}")]
    Configuration(String),
}
