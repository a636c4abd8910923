//! Retry utilities with backoff for resilient API calls.
//!
//! [`with_retry`] is the one retry loop in the crate: the source adapters call it with
//! their rate limiter, an exponential policy and [`TransientError::from_source_error`];
//! the PDF pipeline calls it without a limiter, with a linear policy and a predicate
//! that only retries network failures.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::sources::SourceError;
use crate::utils::RateLimiter;

/// How long to wait after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// `base × 2^(attempt-1)`: 1 s, 2 s, 4 s … for a 1 s base
    Exponential { base: Duration },
    /// `step × attempt`: 500 ms, 1 s, 1.5 s … for a 500 ms step
    Linear { step: Duration },
}

impl Backoff {
    /// Delay after the given 1-based attempt failed
    pub fn delay(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        match self {
            Backoff::Exponential { base } => base.saturating_mul(1u32 << (attempt - 1).min(16)),
            Backoff::Linear { step } => step.saturating_mul(attempt),
        }
    }
}

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn exponential(max_attempts: u32, base: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Exponential { base },
        }
    }

    pub fn linear(max_attempts: u32, step: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Linear { step },
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(3, Duration::from_secs(1))
    }
}

/// Transient errors that should trigger a retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientError {
    /// Network connectivity issues
    Network,
    /// Rate limit exceeded (with the server's `Retry-After`, when sent)
    RateLimit(Option<Duration>),
}

impl TransientError {
    /// Retry predicate used by the source adapters: network failures and 429s
    pub fn from_source_error(err: &SourceError) -> Option<Self> {
        match err {
            SourceError::Network(_) => Some(TransientError::Network),
            SourceError::RateLimited { retry_after } => {
                Some(TransientError::RateLimit(*retry_after))
            }
            _ => None,
        }
    }

    /// Retry predicate that only retries network failures
    pub fn network_only(err: &SourceError) -> Option<Self> {
        match err {
            SourceError::Network(_) => Some(TransientError::Network),
            _ => None,
        }
    }

    /// Get the delay before the next attempt under the given backoff
    pub fn delay(&self, backoff: &Backoff, attempt: u32) -> Duration {
        match self {
            TransientError::RateLimit(Some(retry_after)) => *retry_after,
            _ => backoff.delay(attempt),
        }
    }
}

/// Execute an async operation with retry logic
///
/// # Arguments
///
/// * `policy` - Maximum attempts and backoff
/// * `limiter` - Rate limiter awaited before every attempt, if any
/// * `retry_on` - Classifies an error as transient; `None` fails immediately
/// * `operation` - The async operation to execute
///
/// # Returns
///
/// The result of the operation, or the last error once attempts are exhausted
pub async fn with_retry<T, F, Fut, P>(
    policy: &RetryPolicy,
    limiter: Option<&RateLimiter>,
    retry_on: P,
    mut operation: F,
) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
    P: Fn(&SourceError) -> Option<TransientError>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        if let Some(limiter) = limiter {
            limiter.acquire().await;
        }

        let error = match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(
                        "Operation succeeded on attempt {} after {} transient failures",
                        attempt,
                        attempt - 1
                    );
                }
                return Ok(result);
            }
            Err(error) => error,
        };

        let Some(transient) = retry_on(&error) else {
            return Err(error);
        };

        if attempt >= max_attempts {
            tracing::warn!("Operation failed after {} attempts: {}", attempt, error);
            return Err(error);
        }

        let delay = transient.delay(&policy.backoff, attempt);
        tracing::debug!(
            "Transient error on attempt {}: {:?}, retrying in {:?}",
            attempt,
            transient,
            delay
        );
        sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::exponential(max_attempts, Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_retry_success_first_try() {
        let calls = AtomicU32::new(0);

        let result = with_retry(&fast_policy(3), None, TransientError::from_source_error, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok("success")
        })
        .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_success_after_failures() {
        let calls = AtomicU32::new(0);

        let result = with_retry(&fast_policy(3), None, TransientError::from_source_error, || async {
            let count = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if count < 3 {
                Err(SourceError::Network("temporary error".to_string()))
            } else {
                Ok("success")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> =
            with_retry(&fast_policy(3), None, TransientError::from_source_error, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(SourceError::RateLimited {
                    retry_after: Some(Duration::ZERO),
                })
            })
            .await;

        assert!(matches!(result, Err(SourceError::RateLimited { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_returns_permanent_error() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> =
            with_retry(&fast_policy(5), None, TransientError::from_source_error, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(SourceError::Http {
                    status: 500,
                    message: "boom".to_string(),
                })
            })
            .await;

        assert!(matches!(result, Err(SourceError::Http { status: 500, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_network_only_predicate_skips_rate_limits() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> =
            with_retry(&fast_policy(3), None, TransientError::network_only, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(SourceError::RateLimited { retry_after: None })
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_limiter_is_awaited_between_attempts() {
        let limiter = RateLimiter::new("test", Duration::from_millis(40));
        let calls = AtomicU32::new(0);
        let start = std::time::Instant::now();

        let result: Result<(), _> = with_retry(
            &RetryPolicy::exponential(3, Duration::ZERO),
            Some(&limiter),
            TransientError::from_source_error,
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(SourceError::Network("down".to_string()))
            },
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= Duration::from_millis(80));
    }

    #[test]
    fn test_backoff_delays() {
        let exponential = Backoff::Exponential {
            base: Duration::from_secs(1),
        };
        assert_eq!(exponential.delay(1), Duration::from_secs(1));
        assert_eq!(exponential.delay(2), Duration::from_secs(2));
        assert_eq!(exponential.delay(3), Duration::from_secs(4));

        let linear = Backoff::Linear {
            step: Duration::from_millis(500),
        };
        assert_eq!(linear.delay(1), Duration::from_millis(500));
        assert_eq!(linear.delay(2), Duration::from_millis(1000));
    }

    #[test]
    fn test_transient_error_detection() {
        assert_eq!(
            TransientError::from_source_error(&SourceError::RateLimited {
                retry_after: Some(Duration::from_secs(30))
            }),
            Some(TransientError::RateLimit(Some(Duration::from_secs(30))))
        );
        assert_eq!(
            TransientError::from_source_error(&SourceError::Network("refused".to_string())),
            Some(TransientError::Network)
        );
        assert!(TransientError::from_source_error(&SourceError::Parse("bad".to_string())).is_none());
        assert!(TransientError::from_source_error(&SourceError::NotFound("x".to_string())).is_none());
    }

    #[test]
    fn test_retry_after_overrides_backoff() {
        let backoff = Backoff::Exponential {
            base: Duration::from_secs(1),
        };
        assert_eq!(
            TransientError::RateLimit(Some(Duration::from_secs(30))).delay(&backoff, 1),
            Duration::from_secs(30)
        );
        assert_eq!(
            TransientError::RateLimit(None).delay(&backoff, 2),
            Duration::from_secs(2)
        );
    }
}
