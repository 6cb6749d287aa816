//! Bounded exponential-backoff retry controller.
//!
//! Each attempt runs as its own task and races a per-attempt deadline. When
//! the deadline wins, the attempt task is detached rather than aborted: it
//! keeps running to completion and its late result is dropped.

use std::future::Future;
use std::time::Duration;

use log::{debug, warn};

use crate::errors::QueryError;

/// Default number of attempts per operation.
pub const DEFAULT_RETRY_COUNT: u32 = 3;

/// Default delay before the second attempt; doubles for each later one.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Default deadline for a single attempt.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Retry configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first (minimum 1).
    pub attempts: u32,
    /// Backoff base: the wait after attempt `n` is `base_delay * 2^(n-1)`.
    pub base_delay: Duration,
    /// Deadline for each attempt.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_RETRY_COUNT,
            base_delay: DEFAULT_RETRY_DELAY,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }
}

impl RetryPolicy {
    /// Wait after the failed 1-indexed `attempt`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }

    /// Run `operation` until it succeeds or the attempts are used up.
    ///
    /// Waits between failed attempts, never after the last one. Returns the
    /// last error when every attempt fails.
    pub async fn execute<F, Fut, T>(&self, label: &str, mut operation: F) -> Result<T, QueryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, QueryError>> + Send + 'static,
        T: Send + 'static,
    {
        let attempts = self.attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            let handle = tokio::spawn(operation());

            let outcome = match tokio::time::timeout(self.attempt_timeout, handle).await {
                Ok(Ok(result)) => result,
                Ok(Err(join_error)) => Err(QueryError::System(format!(
                    "Attempt task for {} failed: {}",
                    label, join_error
                ))),
                Err(_) => Err(QueryError::UpstreamUnavailable {
                    url: label.to_string(),
                    message: format!("attempt timed out after {:?}", self.attempt_timeout),
                }),
            };

            match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("Retry: {} succeeded on attempt {}", label, attempt);
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if attempt < attempts {
                        let delay = self.delay_after(attempt);
                        warn!(
                            "Retry: attempt {}/{} for {} failed ({}), retrying in {:?}",
                            attempt, attempts, label, error, delay
                        );
                        tokio::time::sleep(delay).await;
                    } else {
                        warn!(
                            "Retry: giving up on {} after {} attempts: {}",
                            label, attempts, error
                        );
                    }
                    last_error = Some(error);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| QueryError::System(format!("No attempts made for {}", label))))
    }
}
