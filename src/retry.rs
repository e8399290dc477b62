//! Retry utilities for network operations with exponential backoff.
//!
//! The WHOIS registries this tool talks to drop or stall connections under
//! load. A failed attempt `i` (0-based) is followed by a sleep of
//! `initial_delay * multiplier^i` (1s, 2s, 4s, ... by default), but only when
//! the retry policy accepts the error. Nothing sleeps after the final attempt.

use std::time::Duration;

use tokio::time::sleep;

use crate::errors::TransportError;

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one (at least 1)
    pub max_attempts: u32,

    /// Delay after the first failed attempt
    pub initial_delay: Duration,

    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Backoff delay after the failed attempt with the given 0-based index.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt as i32);
        Duration::try_from_secs_f64(self.initial_delay.as_secs_f64() * factor).unwrap_or(Duration::MAX)
    }
}

/// Policy for determining if an operation should be retried
pub trait RetryPolicy<E> {
    /// Returns true if the operation should be retried for this error
    fn should_retry(&self, error: &E, attempt: u32) -> bool;
}

/// WHOIS retry policy: connection resets and timeouts only.
pub struct TransientOnly;

impl RetryPolicy<TransportError> for TransientOnly {
    fn should_retry(&self, error: &TransportError, _attempt: u32) -> bool {
        error.is_transient()
    }
}

/// Final failure of a retried operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryFailure<E> {
    /// Error returned by the last attempt
    pub error: E,
    /// Number of attempts actually made
    pub attempts: u32,
}

/// Retry executor that handles the retry logic
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    /// Create a new retry executor with the given configuration
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute an async operation with retry logic.
    ///
    /// `operation` receives the 0-based attempt index.
    pub async fn execute<F, Fut, T, E, P>(
        &self,
        operation: F,
        policy: P,
    ) -> Result<T, RetryFailure<E>>
    where
        F: Fn(u32) -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        P: RetryPolicy<E>,
        E: std::fmt::Display,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match operation(attempt).await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    let made = attempt + 1;
                    if made >= max_attempts || !policy.should_retry(&error, attempt) {
                        return Err(RetryFailure {
                            error,
                            attempts: made,
                        });
                    }

                    let wait = self.config.delay_for(attempt);
                    tracing::debug!(
                        attempt,
                        wait_secs = wait.as_secs_f64(),
                        error = %error,
                        "retrying after transient failure"
                    );
                    sleep(wait).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TransportErrorKind;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn reset() -> TransportError {
        TransportError::new(
            TransportErrorKind::ConnectionReset,
            "whois.test",
            "read",
            "connection reset by peer",
        )
    }

    #[test]
    fn delays_double_from_one_second() {
        let cfg = RetryConfig::default();
        assert_eq!(cfg.delay_for(0), Duration::from_secs(1));
        assert_eq!(cfg.delay_for(1), Duration::from_secs(2));
        assert_eq!(cfg.delay_for(2), Duration::from_secs(4));
    }

    #[test]
    fn delays_keep_doubling_for_long_retry_budgets() {
        let cfg = RetryConfig {
            max_attempts: 12,
            ..RetryConfig::default()
        };
        assert_eq!(cfg.delay_for(7), Duration::from_secs(128));
        assert_eq!(cfg.delay_for(10), Duration::from_secs(1024));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_back_off_then_succeed() {
        let calls = AtomicU32::new(0);
        let stamps = Mutex::new(Vec::new());
        let start = Instant::now();
        let executor = RetryExecutor::new(RetryConfig::default());

        let result = executor
            .execute(
                |_| {
                    stamps.lock().unwrap().push(start.elapsed());
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move { if n < 2 { Err(reset()) } else { Ok("raw whois") } }
                },
                TransientOnly,
            )
            .await;

        assert_eq!(result.unwrap(), "raw whois");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let stamps = stamps.into_inner().unwrap();
        assert_eq!(
            stamps,
            vec![
                Duration::ZERO,
                Duration::from_secs(1),
                Duration::from_secs(3)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn non_transient_failure_aborts_without_sleeping() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();
        let executor = RetryExecutor::new(RetryConfig::default());

        let result: Result<(), _> = executor
            .execute(
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async {
                        Err(TransportError::new(
                            TransportErrorKind::Other,
                            "whois.test",
                            "connect",
                            "connection refused",
                        ))
                    }
                },
                TransientOnly,
            )
            .await;

        let failure = result.unwrap_err();
        assert_eq!(failure.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_attempts_report_count_and_skip_final_sleep() {
        let start = Instant::now();
        let executor = RetryExecutor::new(RetryConfig::default());

        let result: Result<(), _> = executor
            .execute(|_| async { Err(reset()) }, TransientOnly)
            .await;

        let failure = result.unwrap_err();
        assert_eq!(failure.attempts, 3);
        assert_eq!(failure.error.kind, TransportErrorKind::ConnectionReset);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }
}
