//! Bounded exponential backoff for transport failures.
//!
//! Only [`TransportError`]s are retried. A well-formed non-2xx response is
//! returned as data by the request layer and never reaches this loop.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{ApiConfig, DEFAULT_RETRY_COUNT};
use crate::transport::TransportError;

// MARK: - Constants

/// Delay after the first failed attempt.
const BASE_BACKOFF: Duration = Duration::from_secs(1);

/// Cap on a single delay.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

// MARK: - Retry Policy

/// How many attempts a request gets and how long to wait between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self {
            max_retries: DEFAULT_RETRY_COUNT,
            base_backoff: BASE_BACKOFF,
            max_backoff: MAX_BACKOFF,
        }
    }

    /// Policy derived from an API config's `retry_count`.
    pub fn for_api(api: &ApiConfig) -> Self {
        Self {
            max_retries: api.max_retries(),
            ..Self::new()
        }
    }

    pub fn attempts(self, max_retries: u32) -> Self {
        Self { max_retries, ..self }
    }

    pub fn capped_at(self, max_backoff: Duration) -> Self {
        Self { max_backoff, ..self }
    }

    /// Delay after the `attempt`-th failure (1-based): 1s, 2s, 4s, ...
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_backoff
            .checked_mul(factor)
            .map_or(self.max_backoff, |d| d.min(self.max_backoff))
    }

    /// Whether another attempt is allowed after `attempt` failures.
    pub fn has_attempts_left(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

// MARK: - Retry Executor

/// Run `operation` until it succeeds or the policy's attempt budget is spent.
///
/// The closure receives the 1-based attempt number. At least one attempt is
/// always made, even with `max_retries == 0`.
pub async fn execute_with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, TransportError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match operation(attempt).await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(attempt, "Request succeeded after retry");
                }
                return Ok(result);
            }
            Err(error) => {
                if !policy.has_attempts_left(attempt) {
                    warn!(
                        attempt,
                        max_retries = policy.max_retries,
                        error = %error,
                        "Max retries exceeded"
                    );
                    return Err(error);
                }

                let backoff = policy.delay_after(attempt);
                warn!(
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %error,
                    "Request failed, retrying after backoff"
                );

                tokio::time::sleep(backoff).await;
            }
        }
    }
}

// MARK: - Tests
