//! Rate-limit aware request execution.
//!
//! Every object store call made by the synchronizer, and every theme store
//! call, goes through a [`RequestExecutor`]. It spaces calls out, retries
//! primary and secondary rate limits with backoff, and passes every other
//! error straight through.

use std::future::Future;
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};
use chrono::Utc;
use serde::Deserialize;

use crate::store::{RateLimitKind, StoreError, short_error_message};
use crate::sync::{
    INITIAL_BACKOFF_MS, MAX_BACKOFF_MS, MAX_RETRIES, REQUEST_SPACING_MS,
    SECONDARY_RATE_LIMIT_FLOOR_SECS,
};

/// Configuration for retry operations.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first call.
    pub max_retries: usize,
    /// First backoff delay; doubles on every retry.
    #[serde(with = "millis")]
    pub base_delay: Duration,
    /// Upper bound for any single backoff delay.
    #[serde(with = "millis")]
    pub max_delay: Duration,
    /// Fixed pause before the first attempt of every call.
    #[serde(with = "millis")]
    pub spacing: Duration,
    /// Minimum wait after a secondary rate limit.
    #[serde(with = "millis")]
    pub secondary_floor: Duration,
    /// Whether to add jitter to delays.
    pub with_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            base_delay: Duration::from_millis(INITIAL_BACKOFF_MS),
            max_delay: Duration::from_millis(MAX_BACKOFF_MS),
            spacing: Duration::from_millis(REQUEST_SPACING_MS),
            secondary_floor: Duration::from_secs(SECONDARY_RATE_LIMIT_FLOOR_SECS),
            with_jitter: false,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration with custom backoff values.
    #[must_use]
    pub fn new(base_delay: Duration, max_delay: Duration, max_retries: usize) -> Self {
        Self {
            base_delay,
            max_delay,
            max_retries,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.with_jitter = jitter;
        self
    }

    #[must_use]
    pub fn with_spacing(mut self, spacing: Duration) -> Self {
        self.spacing = spacing;
        self
    }

    #[must_use]
    pub fn with_secondary_floor(mut self, floor: Duration) -> Self {
        self.secondary_floor = floor;
        self
    }

    /// Build an exponential backoff strategy from this configuration.
    #[must_use]
    pub fn into_backoff(self) -> ExponentialBuilder {
        let mut builder = ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries);

        if self.with_jitter {
            builder = builder.with_jitter();
        }

        builder
    }
}

/// Runs requests with spacing and rate-limit retries.
#[derive(Debug, Clone, Default)]
pub struct RequestExecutor {
    config: RetryConfig,
}

impl RequestExecutor {
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute `operation`, retrying only rate-limit failures.
    ///
    /// `label` names the call in log lines. After `max_retries` retries the
    /// last error is returned unchanged.
    pub async fn execute<T, F, Fut>(&self, label: &str, operation: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        self.execute_with(label, |err: &StoreError| err.rate_limit_kind().cloned(), operation)
            .await
    }

    /// Like [`execute`](Self::execute) for any error type.
    ///
    /// `rate_limit_kind` decides which errors are retried and how long to
    /// wait; errors it maps to `None` are returned at once.
    pub async fn execute_with<T, E, F, Fut, C>(
        &self,
        label: &str,
        rate_limit_kind: C,
        mut operation: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error,
        C: Fn(&E) -> Option<RateLimitKind>,
    {
        if !self.config.spacing.is_zero() {
            tokio::time::sleep(self.config.spacing).await;
        }

        let mut backoff = self.config.clone().into_backoff().build();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let Some(kind) = rate_limit_kind(&err) else {
                return Err(err);
            };

            let Some(next) = backoff.next() else {
                tracing::warn!(
                    call = label,
                    attempts = attempt,
                    "Rate limit retries exhausted: {}",
                    short_error_message(&err)
                );
                return Err(err);
            };

            let delay = self.delay_for(&kind, next);
            tracing::debug!(
                call = label,
                attempt,
                kind = %kind,
                "Rate limited, retrying in {:?}",
                delay
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Pick the wait for one rate-limited attempt given the next backoff step.
    ///
    /// A known quota reset is waited out in full, even past `max_delay`.
    fn delay_for(&self, kind: &RateLimitKind, backoff: Duration) -> Duration {
        match kind {
            RateLimitKind::Primary {
                reset_at: Some(reset_at),
            } => {
                let until_reset = (*reset_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                if until_reset.is_zero() {
                    backoff
                } else {
                    until_reset
                }
            }
            RateLimitKind::Primary { reset_at: None } => backoff,
            RateLimitKind::Secondary { retry_after } => backoff
                .max(retry_after.unwrap_or(Duration::ZERO))
                .max(self.config.secondary_floor),
        }
    }
}

pub(crate) mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn primary() -> StoreError {
        StoreError::RateLimited {
            kind: RateLimitKind::Primary { reset_at: None },
            message: "API rate limit exceeded".to_string(),
        }
    }

    fn secondary() -> StoreError {
        StoreError::RateLimited {
            kind: RateLimitKind::Secondary { retry_after: None },
            message: "You have exceeded a secondary rate limit".to_string(),
        }
    }

    fn quick_config() -> RetryConfig {
        RetryConfig::new(Duration::from_secs(1), Duration::from_secs(60), 5)
            .with_spacing(Duration::ZERO)
    }

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();

        assert_eq!(config.base_delay, Duration::from_millis(INITIAL_BACKOFF_MS));
        assert_eq!(config.max_delay, Duration::from_millis(MAX_BACKOFF_MS));
        assert_eq!(config.max_retries, MAX_RETRIES);
        assert_eq!(config.secondary_floor, Duration::from_secs(60));
        assert!(!config.spacing.is_zero());
    }

    #[test]
    fn test_retry_config_deserializes_millis() {
        let config: RetryConfig =
            serde_json::from_value(serde_json::json!({"base_delay": 250, "max_retries": 2}))
                .unwrap();
        assert_eq!(config.base_delay, Duration::from_millis(250));
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.max_delay, Duration::from_millis(MAX_BACKOFF_MS));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_primary_rate_limit_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let executor = RequestExecutor::new(quick_config());
        let start = tokio::time::Instant::now();

        let calls_capture = Arc::clone(&calls);
        let result = executor
            .execute("get_ref", || {
                let calls = Arc::clone(&calls_capture);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(primary())
                    } else {
                        Ok(42u32)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // base + 2 * base
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn secondary_rate_limit_waits_at_least_the_floor() {
        let calls = Arc::new(AtomicU32::new(0));
        let executor = RequestExecutor::new(quick_config());
        let start = tokio::time::Instant::now();

        let calls_capture = Arc::clone(&calls);
        let result = executor
            .execute("create_blob", || {
                let calls = Arc::clone(&calls_capture);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(secondary())
                    } else {
                        Ok("sha")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "sha");
        assert!(start.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn spacing_is_applied_before_first_attempt() {
        let executor = RequestExecutor::new(quick_config().with_spacing(Duration::from_millis(250)));
        let start = tokio::time::Instant::now();

        let result = executor.execute("get_tree", || async { Ok(()) }).await;

        assert!(result.is_ok());
        assert!(start.elapsed() >= Duration::from_millis(250));
    }

    #[tokio::test]
    async fn does_not_retry_other_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let executor = RequestExecutor::new(quick_config());

        let calls_capture = Arc::clone(&calls);
        let err = executor
            .execute("update_ref", || {
                let calls = Arc::clone(&calls_capture);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(StoreError::api(422, "Update is not a fast forward"))
                }
            })
            .await
            .expect_err("expected error");

        assert!(err.to_string().contains("fast forward"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn returns_last_error_after_exhausting_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let executor = RequestExecutor::new(
            RetryConfig::new(Duration::from_millis(10), Duration::from_millis(100), 2)
                .with_spacing(Duration::ZERO),
        );

        let calls_capture = Arc::clone(&calls);
        let err = executor
            .execute("get_blob", || {
                let calls = Arc::clone(&calls_capture);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(primary())
                }
            })
            .await
            .expect_err("expected error");

        assert!(err.is_rate_limited());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn primary_rate_limit_retries_after_the_quota_resets() {
        let calls = Arc::new(AtomicU32::new(0));
        let executor = RequestExecutor::new(quick_config());
        let reset_at = Utc::now() + chrono::Duration::minutes(10);
        let start = tokio::time::Instant::now();

        let calls_capture = Arc::clone(&calls);
        let result = executor
            .execute("get_tree", || {
                let calls = Arc::clone(&calls_capture);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(StoreError::RateLimited {
                            kind: RateLimitKind::Primary {
                                reset_at: Some(reset_at),
                            },
                            message: "API rate limit exceeded".to_string(),
                        })
                    } else {
                        Ok("tree")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "tree");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(start.elapsed() >= Duration::from_secs(9 * 60));
    }

    #[test]
    fn primary_with_reset_hint_waits_until_reset_beyond_max_delay() {
        let executor = RequestExecutor::new(quick_config());
        let kind = RateLimitKind::Primary {
            reset_at: Some(Utc::now() + chrono::Duration::hours(1)),
        };
        let delay = executor.delay_for(&kind, Duration::from_secs(1));
        assert!(delay > executor.config().max_delay);
        assert!(delay >= Duration::from_secs(59 * 60));
        assert!(delay <= Duration::from_secs(60 * 60));

        let past = RateLimitKind::Primary {
            reset_at: Some(Utc::now() - chrono::Duration::seconds(5)),
        };
        assert_eq!(
            executor.delay_for(&past, Duration::from_secs(2)),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn secondary_uses_retry_after_when_longer_than_floor() {
        let executor = RequestExecutor::new(quick_config());
        let kind = RateLimitKind::Secondary {
            retry_after: Some(Duration::from_secs(90)),
        };
        assert_eq!(
            executor.delay_for(&kind, Duration::from_secs(1)),
            Duration::from_secs(90)
        );
    }
}
