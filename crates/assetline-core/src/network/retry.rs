//! Backoff policy for transport requests.
//!
//! Only errors for which [`AssetError::is_retryable`] holds are retried; a 404
//! or a malformed URL fails on the first attempt.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::error::{AssetError, Result};

/// How often and how patiently a single URL is re-requested.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts per URL, the first request included. Never below 1.
    pub attempts: u32,
    /// Wait after the first failure; doubles after each further failure.
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Spread each wait over `[0.5, 1.5)` of its nominal value.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Attempts and initial backoff from `config`, jittered.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            attempts: config.max_retries.max(1),
            initial_backoff: config.retry_base_delay(),
            ..Self::default()
        }
    }

    /// A policy that never retries.
    pub fn once() -> Self {
        Self {
            attempts: 1,
            ..Self::default()
        }
    }

    /// Wait before attempt `failures + 1`, given `failures >= 1` failed
    /// attempts so far.
    pub fn backoff(&self, failures: u32) -> Duration {
        let doublings = failures.saturating_sub(1).min(16);
        let nominal = self
            .initial_backoff
            .saturating_mul(1 << doublings)
            .min(self.max_backoff);

        if !self.jitter {
            return nominal;
        }
        let factor: f64 = rand::rng().random_range(0.5..1.5);
        nominal.mul_f64(factor).min(self.max_backoff)
    }

    /// Run `request` against `url` until it succeeds, fails permanently, or
    /// the attempts are used up. The last error is returned.
    pub async fn run<T, F, Fut>(&self, url: &str, mut request: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.attempts.max(1);
        let mut failures = 0;

        loop {
            let err: AssetError = match request().await {
                Ok(value) => {
                    if failures > 0 {
                        debug!("{} succeeded on attempt {}", url, failures + 1);
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            failures += 1;
            if !err.is_retryable() {
                return Err(err);
            }
            if failures >= attempts {
                warn!("Giving up on {} after {} attempt(s): {}", url, failures, err);
                return Err(err);
            }

            let wait = self.backoff(failures);
            warn!(
                "{} failed (attempt {}/{}): {}; retrying in {:?}",
                url, failures, attempts, err, wait
            );
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn steady(initial_ms: u64) -> RetryPolicy {
        RetryPolicy {
            initial_backoff: Duration::from_millis(initial_ms),
            jitter: false,
            ..RetryPolicy::default()
        }
    }

    fn unavailable() -> AssetError {
        AssetError::HttpStatus {
            url: "https://cdn/a.png".into(),
            status: 503,
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_backoff: Duration::from_secs(5),
            ..steady(1000)
        };
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(4));
        assert_eq!(policy.backoff(4), Duration::from_secs(5));
        assert_eq!(policy.backoff(60), Duration::from_secs(5));
    }

    #[test]
    fn test_jittered_backoff_range() {
        let policy = RetryPolicy {
            jitter: true,
            ..steady(2000)
        };
        for _ in 0..20 {
            let wait = policy.backoff(1);
            assert!(wait >= Duration::from_secs(1) && wait < Duration::from_secs(3));
        }
    }

    #[test]
    fn test_from_config() {
        let config = PipelineConfig {
            max_retries: 0,
            retry_base_delay_ms: 20,
            ..Default::default()
        };
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.attempts, 1);
        assert_eq!(policy.initial_backoff, Duration::from_millis(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let calls = AtomicU32::new(0);
        let body = steady(10)
            .run("https://cdn/a.png", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(unavailable())
                } else {
                    Ok("body")
                }
            })
            .await
            .unwrap();

        assert_eq!(body, "body");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempts_exhausted_returns_last_error() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            attempts: 2,
            ..steady(10)
        };
        let err = policy
            .run("https://cdn/a.png", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(unavailable())
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AssetError::HttpStatus { status: 503, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let calls = AtomicU32::new(0);
        let err = steady(10)
            .run("https://cdn/missing.png", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(AssetError::HttpStatus {
                    url: "https://cdn/missing.png".into(),
                    status: 404,
                })
            })
            .await
            .unwrap_err();

        assert!(!err.is_retryable());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
