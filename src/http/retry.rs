//! Retry policy for API requests: which failures to retry and how long to wait.

use log::{debug, warn};
use std::future::Future;
use std::time::Duration;

use super::error::{ApiError, ErrorKind};

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Delay before the first retry in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;

/// Factor applied to the delay for each subsequent retry.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// HTTP statuses considered transient.
pub const RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Retry configuration, created once at startup and shared read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt; total attempts are `max_retries + 1`.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub retryable_statuses: Vec<u16>,
    /// Upper bound on a single delay. Unbounded when `None`.
    pub max_delay: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            retryable_statuses: RETRYABLE_STATUSES.to_vec(),
            max_delay: None,
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }

    /// Whether an error of this kind can succeed on a later attempt,
    /// ignoring how many attempts were already made.
    pub fn is_retryable(&self, error: &ApiError) -> bool {
        match error.kind() {
            ErrorKind::Authentication | ErrorKind::Validation => false,
            ErrorKind::Network => true,
            ErrorKind::Server | ErrorKind::Unknown => error
                .status()
                .is_some_and(|status| self.is_retryable_status(status)),
        }
    }

    /// Decides whether the failed attempt `attempt` (0-based) should be followed by another.
    pub fn should_retry(&self, error: &ApiError, attempt: u32) -> bool {
        attempt < self.max_retries && self.is_retryable(error)
    }

    /// Delay before the retry that follows attempt `attempt`: `base_delay * multiplier^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let delay = Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX);
        match self.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        }
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error,
    /// or `max_retries` retries have been used. Returns the last error.
    pub(crate) async fn run<F, Fut, T>(
        &self,
        operation_name: &str,
        max_retries: u32,
        mut operation: F,
    ) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            let error = match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => e,
            };

            if attempt >= max_retries {
                debug!(
                    "{}: giving up after {} attempts: {}",
                    operation_name,
                    attempt + 1,
                    error
                );
                return Err(error);
            }
            if !self.is_retryable(&error) {
                debug!("{}: non-retryable {} error: {}", operation_name, error.kind(), error);
                return Err(error);
            }

            let delay = self.delay_for(attempt);
            warn!(
                "{}: attempt {}/{} failed ({}), retrying in {}ms...",
                operation_name,
                attempt + 1,
                max_retries + 1,
                error,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Retries a caller-supplied operation for user-triggered "try again" actions.
    ///
    /// Makes at most `max_attempts` tries (at least one) using the same retry rules and
    /// backoff as regular requests. When the operation finally fails, `report` receives the
    /// error before it is returned.
    pub async fn retry_operation<F, Fut, T, R>(
        &self,
        operation_name: &str,
        max_attempts: u32,
        operation: F,
        report: R,
    ) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
        R: FnOnce(&ApiError),
    {
        let result = self
            .run(operation_name, max_attempts.saturating_sub(1), operation)
            .await;
        if let Err(e) = &result {
            report(e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::error::classify;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    #[test]
    fn test_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.base_delay, Duration::from_millis(1000));
        assert_eq!(config.multiplier, 2.0);
        assert_eq!(config.retryable_statuses, vec![408, 429, 500, 502, 503, 504]);
        assert_eq!(config.max_delay, None);
    }

    #[test]
    fn test_should_retry_transient_statuses() {
        let config = RetryConfig::default();
        for status in [500, 502, 503, 504, 408, 429] {
            let err = classify(status, None);
            for attempt in 0..config.max_retries {
                assert!(config.should_retry(&err, attempt), "status {} attempt {}", status, attempt);
            }
            assert!(!config.should_retry(&err, config.max_retries));
        }
    }

    #[test]
    fn test_should_retry_never_for_auth_or_validation() {
        let config = RetryConfig::default();
        for status in [401, 400, 422] {
            let err = classify(status, None);
            for attempt in 0..=config.max_retries + 2 {
                assert!(!config.should_retry(&err, attempt), "status {}", status);
            }
        }
    }

    #[test]
    fn test_should_retry_network() {
        let config = RetryConfig::default();
        let err = ApiError::network("connection reset");
        assert!(config.should_retry(&err, 0));
        assert!(config.should_retry(&err, 2));
        assert!(!config.should_retry(&err, 3));
    }

    #[test]
    fn test_should_retry_other_statuses() {
        let config = RetryConfig::default();
        for status in [403, 404, 409, 418, 501] {
            assert!(!config.should_retry(&classify(status, None), 0), "status {}", status);
        }
        // A kind without a status is not retryable unless it is a network error
        let err = ApiError::new(ErrorKind::Unknown, "decode failed");
        assert!(!config.should_retry(&err, 0));
    }

    #[test]
    fn test_delay_for() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for(0), Duration::from_millis(1000));
        assert_eq!(config.delay_for(1), Duration::from_millis(2000));
        assert_eq!(config.delay_for(2), Duration::from_millis(4000));
        assert_eq!(config.delay_for(3), Duration::from_millis(8000));
    }

    #[test]
    fn test_delay_for_cap_and_overflow() {
        let config = RetryConfig::default().with_max_delay(Duration::from_secs(5));
        assert_eq!(config.delay_for(2), Duration::from_millis(4000));
        assert_eq!(config.delay_for(3), Duration::from_secs(5));

        let uncapped = RetryConfig::default();
        assert_eq!(uncapped.delay_for(u32::MAX), Duration::MAX);

        // 0 * inf must not saturate
        let immediate = RetryConfig::default().with_base_delay(Duration::ZERO);
        assert_eq!(immediate.delay_for(1100), Duration::ZERO);
        assert_eq!(immediate.delay_for(u32::MAX), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_operation_success_after_retries() {
        let config = RetryConfig::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let start = Instant::now();

        let result = config
            .retry_operation(
                "test",
                3,
                || {
                    let calls = Arc::clone(&calls_clone);
                    async move {
                        if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                            Err(ApiError::network("connection reset"))
                        } else {
                            Ok("done")
                        }
                    }
                },
                |_| panic!("report must not be called on success"),
            )
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_operation_reports_on_exhaustion() {
        let config = RetryConfig::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let mut reported = None;

        let result: Result<(), _> = config
            .retry_operation(
                "test",
                2,
                || {
                    let calls = Arc::clone(&calls_clone);
                    async move {
                        let n = calls.fetch_add(1, Ordering::SeqCst);
                        Err(classify(503, None).with_code(format!("attempt-{}", n)))
                    }
                },
                |e| reported = Some(e.clone()),
            )
            .await;

        let err = result.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(err.code(), Some("attempt-1"));
        assert_eq!(reported, Some(err));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_operation_reports_non_retryable_immediately() {
        let config = RetryConfig::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let mut reported = false;
        let start = Instant::now();

        let result: Result<(), _> = config
            .retry_operation(
                "test",
                5,
                || {
                    let calls = Arc::clone(&calls_clone);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err(classify(422, None))
                    }
                },
                |_| reported = true,
            )
            .await;

        assert_eq!(result.unwrap_err().kind(), ErrorKind::Validation);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(reported);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[test_log::test(tokio::test)]
    async fn test_retry_operation_zero_attempts_still_runs_once() {
        let config = RetryConfig::default();
        let result = config
            .retry_operation("test", 0, || async { Ok::<_, ApiError>(7) }, |_| {})
            .await;
        assert_eq!(result.unwrap(), 7);
    }
}
