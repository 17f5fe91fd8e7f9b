//! Fixed-interval retry for rating calls.
//!
//! ```rust
//! use std::time::Duration;
//! use parcel_predict_engine::rating::{RatingError, RetryPolicy};
//!
//! # async fn example() -> Result<(), RatingError> {
//! let policy = RetryPolicy::fixed(3, Duration::from_secs(5));
//! let reply = policy.retry(|_attempt| async { Ok::<_, RatingError>(42) }).await?;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use super::RatingError;

/// Retry policy applied to every rating call made by a client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: usize,
    /// Delay between attempts.
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(3, Duration::from_secs(5))
    }
}

impl RetryPolicy {
    /// Create a policy with a fixed delay between attempts.
    ///
    /// `max_attempts` of zero is treated as one.
    pub fn fixed(max_attempts: usize, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }

    /// Whether `error` is worth another attempt.
    ///
    /// A reply that does not decode will not decode next time either.
    pub fn is_retryable(error: &RatingError) -> bool {
        matches!(error, RatingError::Transport(_) | RatingError::Timeout(_))
    }

    /// Run `f` until it succeeds, fails non-retryably, or attempts run out.
    ///
    /// `f` receives the 1-based attempt number.
    ///
    /// # Errors
    ///
    /// - the operation's own error if it is not retryable
    /// - [`RatingError::Exhausted`] once every attempt has failed
    pub async fn retry<F, Fut, T>(&self, mut f: F) -> Result<T, RatingError>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T, RatingError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            debug!(attempt, max = self.max_attempts, "retry: attempting operation");

            match f(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "retry: operation succeeded after retries");
                    }
                    return Ok(value);
                }
                Err(e) if !Self::is_retryable(&e) => {
                    warn!(error = %e, "retry: error is not retryable");
                    return Err(e);
                }
                Err(e) => {
                    warn!(attempt, max = self.max_attempts, error = %e, "retry: operation failed");
                    if attempt >= self.max_attempts {
                        warn!(attempts = attempt, "retry: all attempts exhausted");
                        return Err(RatingError::Exhausted {
                            attempts: attempt,
                            last: e.to_string(),
                        });
                    }
                    tokio::time::sleep(self.interval).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_default_is_three_attempts_five_seconds() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_attempts, 3);
        assert_eq!(p.interval, Duration::from_secs(5));
    }

    #[test]
    fn test_zero_attempts_means_one() {
        assert_eq!(RetryPolicy::fixed(0, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_retry_succeeds_eventually() {
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = RetryPolicy::fixed(5, Duration::from_millis(5));
        let result = policy
            .retry(|_| {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(RatingError::Timeout("slow".into()))
                    } else {
                        Ok("rated")
                    }
                }
            })
            .await;
        assert_eq!(result, Ok("rated"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausts_attempts() {
        let policy = RetryPolicy::fixed(3, Duration::from_millis(5));
        let result: Result<(), _> = policy
            .retry(|_| async { Err(RatingError::Transport("down".into())) })
            .await;
        assert!(
            matches!(&result, Err(RatingError::Exhausted { attempts: 3, last }) if last.contains("down")),
            "got {result:?}"
        );
    }

    #[tokio::test]
    async fn test_serialization_error_is_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = RetryPolicy::fixed(3, Duration::from_millis(5));
        let result: Result<(), _> = policy
            .retry(|_| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(RatingError::Serialization("bad reply".into()))
                }
            })
            .await;
        assert!(matches!(result, Err(RatingError::Serialization(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempt_number_is_passed_through() {
        let policy = RetryPolicy::fixed(3, Duration::from_millis(1));
        let result = policy
            .retry(|attempt| async move {
                if attempt == 3 {
                    Ok(attempt)
                } else {
                    Err(RatingError::Timeout(String::new()))
                }
            })
            .await;
        assert_eq!(result, Ok(3));
    }
}
