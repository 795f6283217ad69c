// src/retry/policy.rs

use crate::backend::{BackendError, Context};
use crate::config::RetryConfig;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    NoRetry,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Total attempts per request, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts.max(1)
    }

    /// Cancellation is surfaced to the caller as-is; everything else from a
    /// backend is worth another item.
    pub fn classify(error: &BackendError) -> RetryDecision {
        if error.is_cancellation() {
            RetryDecision::NoRetry
        } else {
            RetryDecision::Retry
        }
    }

    /// Wait before attempt `attempt + 1`. Returns early with the context's
    /// error if it is cancelled while waiting.
    pub async fn pause(&self, ctx: &Context, attempt: u32) -> Result<(), BackendError> {
        let backoff = self.calculate_backoff(attempt);
        if backoff.is_zero() {
            return Ok(());
        }
        debug!(attempt, backoff_ms = backoff.as_millis() as u64, "backing off before retry");
        ctx.sleep(backoff).await
    }

    /// Calculate exponential backoff with jitter
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let base = self.config.backoff_base_ms;
        if base == 0 || attempt == 0 {
            return Duration::ZERO;
        }
        let max = self.config.backoff_max_ms.max(base);

        // Exponential backoff: base * 2^(attempt - 1)
        let exponential = base.saturating_mul(2u64.saturating_pow(attempt - 1));

        // Cap at maximum
        let capped = exponential.min(max);

        // Add jitter (0-25% of the calculated backoff)
        let jitter = (capped as f64 * rand::random::<f64>() * 0.25) as u64;

        Duration::from_millis(capped + jitter)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
