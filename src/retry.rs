//! Bounded retry with exponential backoff and jitter.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{Result, SearchError};

/// Retry policy for transient failures.
///
/// Delays grow exponentially from `base_delay`, cap at `max_delay`, and get a
/// random jitter so repeated clients do not retry in lockstep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Fraction of the delay added as random jitter (0.0 disables).
    pub jitter_ratio: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            jitter_ratio: 0.25,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the given attempt count and default delays.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(1)
    }

    /// Returns the backoff delay before the next attempt, where `attempt` is
    /// the 1-based number of the attempt that just failed.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.base_delay
            .checked_mul(1u32 << shift)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Adds random jitter to a delay.
    pub fn with_jitter(&self, delay: Duration) -> Duration {
        if self.jitter_ratio <= 0.0 {
            return delay;
        }
        let jitter = delay.mul_f64(self.jitter_ratio * rand::random::<f64>());
        delay + jitter
    }
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts run out. The final error is returned unchanged.
pub async fn retry_with_backoff<T, F, Fut, P>(
    policy: &RetryPolicy,
    is_retryable: P,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&SearchError) -> bool,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_attempts && is_retryable(&err) => {
                let delay = policy.with_jitter(policy.backoff_delay(attempt));
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying after transient failure"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Heuristic for transient browser/network failures worth another attempt.
///
/// Matches against the error message because the CDP layer reports most
/// network-level failures as strings.
pub fn is_transient_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    [
        "timeout",
        "timed out",
        "connection reset",
        "connection refused",
        "connection closed",
        "net::err_connection",
        "net::err_timed_out",
        "net::err_network_changed",
        "net::err_name_not_resolved",
        "net::err_proxy_connection_failed",
    ]
    .iter()
    .any(|marker| lower.contains(marker))
}
