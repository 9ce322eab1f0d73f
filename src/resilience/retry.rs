//! Bounded retry with capped exponential backoff.
//!
//! Attempt 0 is the first try. After a failed attempt `n` that is eligible
//! for retry, the engine sleeps `min(initial_delay * 2^n, max_delay)` and
//! tries again, up to `max_retries` extra attempts.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

/// Retry bounds and backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(max_retries: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_delay,
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }

    /// Delay before the attempt following failed attempt `attempt`.
    ///
    /// Non-decreasing in `attempt` and never above `max_delay`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_millis(300), Duration::from_millis(1200))
    }
}

/// Successful outcome, annotated with the number of retries it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retried<T> {
    pub value: T,
    /// Failed attempts that were followed by a wait.
    pub retries: u32,
}

/// Terminal failure of a retried operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryFailure<E> {
    /// The error from the last attempt.
    pub error: E,
    /// Failed attempts that were followed by a wait.
    pub retries: u32,
    /// True when the attempt budget ran out, false when the predicate
    /// declined to retry.
    pub exhausted: bool,
}

impl<E> RetryFailure<E> {
    /// Total number of times the operation ran.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.retries + 1
    }
}

/// Run `operation` until it succeeds, the predicate refuses, or the policy
/// runs out of attempts.
///
/// `should_retry` is consulted only while attempts remain, so it runs at most
/// `max_retries` times. Total invocations of `operation` never exceed
/// `max_retries + 1`.
pub async fn retry<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    mut operation: F,
    mut should_retry: P,
) -> Result<Retried<T>, RetryFailure<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: FnMut(&E) -> bool,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => {
                return Ok(Retried {
                    value,
                    retries: attempt,
                })
            }
            Err(error) => {
                if attempt >= policy.max_retries {
                    return Err(RetryFailure {
                        error,
                        retries: attempt,
                        exhausted: true,
                    });
                }
                if !should_retry(&error) {
                    return Err(RetryFailure {
                        error,
                        retries: attempt,
                        exhausted: false,
                    });
                }

                let delay = policy.delay_for(attempt);
                debug!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying after delay"
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::from_millis(1), Duration::from_millis(4))
    }

    #[tokio::test]
    async fn test_succeeds_on_first_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = retry(
            &fast_policy(2),
            || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>("data")
                }
            },
            |_| true,
        )
        .await
        .unwrap();

        assert_eq!(result.value, "data");
        assert_eq!(result.retries, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_always_failing_runs_max_retries_plus_one() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let failure = retry(
            &fast_policy(2),
            || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>("network error")
                }
            },
            |_| true,
        )
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(failure.retries, 2);
        assert_eq!(failure.attempts(), 3);
        assert!(failure.exhausted);
    }

    #[tokio::test]
    async fn test_fail_once_then_succeed() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = retry(
            &fast_policy(2),
            || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err("network error")
                    } else {
                        Ok("data")
                    }
                }
            },
            |_| true,
        )
        .await
        .unwrap();

        assert_eq!(result.retries, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_stops_after_one_call() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let failure = retry(
            &fast_policy(2),
            || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>("Invalid input")
                }
            },
            |e: &&str| e.contains("network"),
        )
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(failure.error, "Invalid input");
        assert_eq!(failure.retries, 0);
        assert!(!failure.exhausted);
    }

    #[tokio::test]
    async fn test_zero_retries_runs_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let failure = retry(
            &RetryPolicy::none(),
            || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>("network error")
                }
            },
            |_| true,
        )
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(failure.exhausted);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(5, Duration::from_millis(300), Duration::from_millis(1200));

        assert_eq!(policy.delay_for(0), Duration::from_millis(300));
        assert_eq!(policy.delay_for(1), Duration::from_millis(600));
        assert_eq!(policy.delay_for(2), Duration::from_millis(1200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(1200)); // Capped at max
        assert_eq!(policy.delay_for(40), Duration::from_millis(1200));
    }

    #[test]
    fn test_backoff_is_monotonic() {
        let policy = RetryPolicy::new(10, Duration::from_millis(7), Duration::from_millis(500));
        let delays: Vec<_> = (0..12).map(|n| policy.delay_for(n)).collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    }
}
