//! Error types for queue operations

use std::time::Duration;

use crate::store::StoreError;

/// Errors surfaced by the notification queue
///
/// Only failures on a synchronous path reach the caller: direct reads,
/// synchronous-fallback writes and explicit cancellation. Background failures
/// (async publishes, trim, expiry sweeps) are logged and absorbed.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The ordered store failed or is unreachable (retryable)
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Caller input rejected before any store access
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The caller cancelled the request (e.g. client disconnected)
    #[error("request cancelled")]
    Cancelled,

    /// Health probe did not answer in time
    #[error("health check timed out after {0:?}")]
    HealthCheckTimeout(Duration),

    /// In-flight publishes did not drain before the shutdown deadline
    #[error("graceful shutdown timed out")]
    ShutdownTimeout,

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A background task ended without producing a result
    #[error("internal error: {0}")]
    Internal(String),
}

impl QueueError {
    /// Whether the error was caused by caller input
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }

    /// Whether retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(_) | Self::HealthCheckTimeout(_))
    }
}
