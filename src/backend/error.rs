// src/backend/error.rs
use thiserror::Error;

/// Failures surfaced by a backend transport or by the request context.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("request cancelled")]
    Cancelled,

    #[error("request deadline exceeded")]
    DeadlineExceeded,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("health probe returned status {0}")]
    Unhealthy(u16),

    #[error("health probe not supported by this backend")]
    HealthUnsupported,

    #[error("invalid backend address {0}: {1}")]
    InvalidAddress(String, String),
}

impl BackendError {
    /// True when the caller gave up on the request (cancelled or timed out).
    /// Such outcomes are never retried and never count against an item.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, BackendError::Cancelled | BackendError::DeadlineExceeded)
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        BackendError::Transport(err.to_string())
    }
}
