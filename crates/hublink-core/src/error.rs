//! Error types and result handling for gateway operations.
//!
//! Defines a coded error taxonomy so callers can disambiguate input errors
//! (never retried) from upstream platform failures and transient processing
//! errors (retried with backoff). Ingress boundaries translate these into
//! redirects or HTTP status codes; raw internals are never leaked.

use thiserror::Error;

use crate::models::{TaskId, WorkspaceId};

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error type for storage-layer operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Entity not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Constraint violation.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// Invalid input.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound("requested entity not found".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Self::ConstraintViolation(format!("unique constraint violation: {db_err}"))
            },
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                Self::ConstraintViolation(format!("foreign key constraint violation: {db_err}"))
            },
            _ => Self::Database(err.to_string()),
        }
    }
}

/// Gateway error taxonomy with stable codes.
///
/// Codes group by failure class: E1xxx for input errors rejected at the
/// boundary, E2xxx for upstream platform failures, E3xxx for processing and
/// infrastructure failures.
#[derive(Debug, Error)]
pub enum GatewayError {
    // Input errors (E1001-E1005)
    /// The `state` parameter did not resolve to a known workspace (E1001).
    #[error("[E1001] unknown workspace in state parameter")]
    UnknownWorkspace,

    /// No installation visible to the principal matched the callback (E1002).
    #[error("[E1002] installation {installation_id} not visible to principal")]
    InstallationMismatch {
        /// Installation identifier from the callback query.
        installation_id: String,
    },

    /// Webhook signature missing or invalid (E1003).
    #[error("[E1003] invalid webhook signature: {reason}")]
    InvalidSignature {
        /// Why validation failed.
        reason: String,
    },

    /// Webhook payload exceeds the size cap (E1004).
    #[error("[E1004] payload too large: {size_bytes} bytes")]
    PayloadTooLarge {
        /// Size of the rejected payload in bytes.
        size_bytes: usize,
    },

    /// Authorization code missing from a non-error callback (E1005).
    #[error("[E1005] authorization code missing from callback")]
    MissingCode,

    // Upstream platform errors (E2001-E2003)
    /// OAuth code exchange with the platform failed (E2001).
    #[error("[E2001] code exchange failed: {reason}")]
    CodeExchangeFailed {
        /// Platform-reported or transport-level reason.
        reason: String,
    },

    /// Installation listing call failed (E2002).
    #[error("[E2002] installation listing failed: {reason}")]
    InstallationListingFailed {
        /// Platform-reported or transport-level reason.
        reason: String,
    },

    /// Outbound platform call exceeded its timeout (E2003).
    #[error("[E2003] platform request timed out after {timeout_ms}ms")]
    PlatformTimeout {
        /// Timeout that was exceeded, in milliseconds.
        timeout_ms: u64,
    },

    // Processing errors (E3001-E3004)
    /// Task queue unavailable at enqueue time (E3001).
    #[error("[E3001] task queue unavailable")]
    QueueUnavailable,

    /// Task payload could not be interpreted (E3002).
    #[error("[E3002] malformed task payload for {task_id}: {reason}")]
    MalformedTask {
        /// Task whose payload failed to parse.
        task_id: TaskId,
        /// Parse failure detail.
        reason: String,
    },

    /// Task exhausted its retry budget (E3003).
    #[error("[E3003] task {task_id} dead-lettered after {attempts} attempts")]
    RetriesExhausted {
        /// Task moved to the dead-letter state.
        task_id: TaskId,
        /// Attempts consumed before giving up.
        attempts: u32,
    },

    /// Persistence failed while writing the integration pair (E3004).
    #[error("[E3004] integration persistence failed for workspace {workspace_id}")]
    PersistenceFailed {
        /// Workspace whose linking transaction rolled back.
        workspace_id: WorkspaceId,
    },

    /// Generic database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Generic storage error.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl GatewayError {
    /// Returns the stable error code for this failure.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnknownWorkspace => "E1001",
            Self::InstallationMismatch { .. } => "E1002",
            Self::InvalidSignature { .. } => "E1003",
            Self::PayloadTooLarge { .. } => "E1004",
            Self::MissingCode => "E1005",
            Self::CodeExchangeFailed { .. } => "E2001",
            Self::InstallationListingFailed { .. } => "E2002",
            Self::PlatformTimeout { .. } => "E2003",
            Self::QueueUnavailable => "E3001",
            Self::MalformedTask { .. } => "E3002",
            Self::RetriesExhausted { .. } => "E3003",
            Self::PersistenceFailed { .. } => "E3004",
            Self::Database(_) | Self::Core(_) => "E9999",
        }
    }

    /// Returns whether this error should trigger a retry.
    ///
    /// Input errors and malformed payloads are permanent; queue and
    /// persistence failures are transient and safe to redeliver.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::PlatformTimeout { .. }
                | Self::QueueUnavailable
                | Self::PersistenceFailed { .. }
                | Self::Database(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(GatewayError::UnknownWorkspace.code(), "E1001");
        assert_eq!(
            GatewayError::InvalidSignature { reason: "mismatch".into() }.code(),
            "E1003"
        );
        assert_eq!(GatewayError::QueueUnavailable.code(), "E3001");
        assert_eq!(
            GatewayError::PlatformTimeout { timeout_ms: 5000 }.code(),
            "E2003"
        );
    }

    #[test]
    fn retryable_errors_identified() {
        assert!(GatewayError::QueueUnavailable.is_retryable());
        assert!(GatewayError::PlatformTimeout { timeout_ms: 1 }.is_retryable());
        assert!(!GatewayError::UnknownWorkspace.is_retryable());
        assert!(!GatewayError::InvalidSignature { reason: String::new() }.is_retryable());
        assert!(!GatewayError::MissingCode.is_retryable());
    }
}
