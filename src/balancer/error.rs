// src/balancer/error.rs
use crate::backend::BackendError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BalancerError {
    /// No item was eligible for the request.
    #[error("no backend available")]
    NoBackend,

    /// The caller cancelled or timed out. Not retried, not held against any item.
    #[error("request cancelled: {0}")]
    Cancelled(#[source] BackendError),

    /// Every attempt in the budget failed; carries the last backend error.
    #[error("request failed after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: BackendError,
    },

    #[error("backend pool is empty")]
    EmptyPool,

    #[error("invalid backend: {0}")]
    InvalidBackend(#[from] BackendError),

    #[error("metrics registration failed: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl BalancerError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, BalancerError::Cancelled(_))
    }

    /// The backend error behind a failed request, if there was one.
    pub fn backend_error(&self) -> Option<&BackendError> {
        match self {
            BalancerError::Cancelled(err) | BalancerError::InvalidBackend(err) => Some(err),
            BalancerError::Exhausted { source, .. } => Some(source),
            _ => None,
        }
    }
}
