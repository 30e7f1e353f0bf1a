/// Bounded retry with linear backoff for eviction attempts
use crate::{InvalidationError, InvalidationResult};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Sleep after failed attempt `n` is `backoff_step * n`
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given (1-based) failed attempt
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff_step.saturating_mul(attempt)
    }
}

/// Run `f` until it succeeds or the attempt budget is spent.
///
/// Never sleeps after the final attempt. On exhaustion the failure is logged
/// at error level and returned as [`InvalidationError::RetriesExhausted`].
pub async fn with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    operation: &'static str,
    entity: impl Display,
    mut f: F,
) -> InvalidationResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = InvalidationResult<T>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                let delay = policy.delay_after(attempt);
                warn!(
                    operation,
                    entity = %entity,
                    attempt,
                    max_attempts = attempts,
                    error = %e,
                    "Eviction attempt failed, retrying in {:?}",
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                error!(
                    operation,
                    entity = %entity,
                    attempts,
                    error = %e,
                    "Eviction failed, retry budget exhausted"
                );
                return Err(InvalidationError::RetriesExhausted {
                    operation,
                    entity: entity.to_string(),
                    attempts,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            backoff_step: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_retry_success_on_first_attempt() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(&fast_policy(), "message", "m1", move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, InvalidationError>(42) }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_success_after_failure() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(&fast_policy(), "message", "m1", move || {
            let count = counter_clone.fetch_add(1, Ordering::SeqCst);
            async move {
                if count == 0 {
                    Err(InvalidationError::Store("transient".into()))
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_budget_exhausted() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result: InvalidationResult<()> = with_retry(&fast_policy(), "user", "u1", move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            async { Err(InvalidationError::Store("down".into())) }
        })
        .await;

        assert!(matches!(
            result,
            Err(InvalidationError::RetriesExhausted { attempts: 3, .. })
        ));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_backoff_elapsed() {
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff_step: Duration::from_millis(10),
        };
        let start = std::time::Instant::now();

        let _: InvalidationResult<()> = with_retry(&policy, "message", "m1", || async {
            Err(InvalidationError::Store("down".into()))
        })
        .await;

        // 10ms + 20ms, no sleep after the last attempt
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
