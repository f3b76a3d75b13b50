//! Error types for task queue operations.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for task operations.
pub type Result<T> = std::result::Result<T, TaskError>;

/// Errors from scheduling and processing webhook tasks.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Enqueue failed because the queue backend is unavailable.
    ///
    /// The ingress endpoint surfaces this as a server error so the
    /// provider's retry mechanism redelivers later.
    #[error("task queue unavailable: {message}")]
    QueueUnavailable {
        /// Backend failure detail.
        message: String,
    },

    /// Storage operation failed during claiming or status updates.
    #[error("task storage error: {message}")]
    Storage {
        /// Storage failure detail.
        message: String,
    },

    /// Graceful shutdown did not finish within its timeout.
    #[error("worker shutdown timed out after {timeout:?}")]
    ShutdownTimeout {
        /// Drain timeout that was exceeded.
        timeout: Duration,
    },
}

impl TaskError {
    /// Creates a queue-unavailable error from a backend message.
    pub fn queue_unavailable(message: impl Into<String>) -> Self {
        Self::QueueUnavailable { message: message.into() }
    }

    /// Creates a storage error from a backend message.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage { message: message.into() }
    }
}

impl From<hublink_core::CoreError> for TaskError {
    fn from(err: hublink_core::CoreError) -> Self {
        Self::Storage { message: err.to_string() }
    }
}
