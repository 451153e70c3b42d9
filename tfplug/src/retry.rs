//! Retry of operations that fail transiently
//!
//! Cloud APIs answer with transient errors while a dependent object drains
//! or settles (detaching a NIC from an instance that is still provisioning,
//! deleting a fabric network that still has instances on it). Callers wrap
//! such operations in [`retry_on_predicate`] with a predicate that picks
//! out the transient errors; everything else fails fast.

use std::future::Future;
use std::time::Duration;
use tokio::time;

/// How long and how often to retry. The window is an overall ceiling, not
/// a per-attempt timeout.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub min_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            min_interval: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError<E: std::fmt::Display> {
    /// The operation failed with an error the predicate did not claim
    #[error("{0}")]
    Operation(E),

    /// The retry window elapsed; carries the last error observed
    #[error("still failing after {window:?}: {last}")]
    Timeout { window: Duration, last: E },
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// policy's window elapses.
///
/// The deadline is checked after each failed attempt, never mid-sleep, so
/// a retryable failure is only converted to [`RetryError::Timeout`] once
/// the full window has actually passed. One final attempt runs at the
/// deadline itself.
pub async fn retry_on_predicate<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    is_retryable: P,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let deadline = time::Instant::now() + policy.timeout;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if is_retryable(&e) => {
                let now = time::Instant::now();
                if now >= deadline {
                    return Err(RetryError::Timeout {
                        window: policy.timeout,
                        last: e,
                    });
                }
                let next = std::cmp::min(now + policy.min_interval, deadline);
                time::sleep_until(next).await;
            }
            Err(e) => return Err(RetryError::Operation(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, thiserror::Error)]
    enum TestError {
        #[error("busy")]
        Busy,
        #[error("fatal")]
        Fatal,
    }

    fn is_busy(e: &TestError) -> bool {
        matches!(e, TestError::Busy)
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let result = retry_on_predicate(&policy, is_busy, || async {
            if attempts.fetch_add(1, Ordering::SeqCst) < 3 {
                Err(TestError::Busy)
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_fails_immediately() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::default();
        let start = time::Instant::now();

        let result: Result<(), _> = retry_on_predicate(&policy, is_busy, || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(TestError::Fatal)
        })
        .await;

        assert!(matches!(result, Err(RetryError::Operation(TestError::Fatal))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_failure_times_out_only_after_full_window() {
        let policy = RetryPolicy {
            timeout: Duration::from_secs(120),
            min_interval: Duration::from_secs(1),
        };
        let start = time::Instant::now();

        let result: Result<(), _> =
            retry_on_predicate(&policy, is_busy, || async { Err(TestError::Busy) }).await;

        match result {
            Err(RetryError::Timeout { window, last }) => {
                assert_eq!(window, Duration::from_secs(120));
                assert!(matches!(last, TestError::Busy));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        assert!(start.elapsed() >= Duration::from_secs(120));
    }

    #[tokio::test(start_paused = true)]
    async fn shortened_window_is_honored() {
        let policy = RetryPolicy::with_timeout(Duration::from_secs(5));
        let start = time::Instant::now();

        let result: Result<(), _> =
            retry_on_predicate(&policy, is_busy, || async { Err(TestError::Busy) }).await;

        assert!(matches!(result, Err(RetryError::Timeout { .. })));
        assert!(start.elapsed() >= Duration::from_secs(5));
        assert!(start.elapsed() <= Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_success_does_not_sleep() {
        let policy = RetryPolicy::default();
        let start = time::Instant::now();

        let result = retry_on_predicate(&policy, is_busy, || async { Ok::<_, TestError>(1) }).await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
