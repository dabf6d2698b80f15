//! Bounded exponential backoff
//!
//! Retry is data, not a decorator: providers hold a `RetryPolicy` and wrap
//! their single outbound call in `with_retry`. Any error is considered
//! retryable within the attempt budget; classification happens above this
//! layer.

use std::future::Future;
use std::time::Duration;

/// Backoff policy for outbound provider calls
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_backoff: Duration,
    /// Delays double per attempt up to this cap
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given failed attempt (1-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = self.initial_backoff.saturating_mul(1u32 << exp);
        delay.min(self.max_backoff)
    }
}

/// Run `op` until it succeeds or the attempt budget is exhausted.
///
/// Returns the last error when every attempt fails.
pub async fn with_retry<T, E, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                let delay = policy.backoff_for(attempt);
                log::warn!(
                    "Attempt {}/{} failed ({}), retrying in {:?}",
                    attempt,
                    attempts,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
