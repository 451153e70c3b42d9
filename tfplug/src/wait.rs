//! Polling for asynchronous server-side transitions
//!
//! Create and delete calls return before the object reaches its final
//! state; the provider polls until the observed state converges. Two
//! forms exist:
//!
//! * [`StateChangeConf`] follows a labeled state machine (an instance
//!   moving `provisioning` -> `running`, a volume moving `deleting` ->
//!   `deleted`). Known-failure states are surfaced by the refresh closure
//!   as errors and abort the wait immediately.
//! * [`wait_for`] polls until a predicate over the refreshed value holds.
//!   Used where there is no single state label - tag, metadata and CNS
//!   convergence, package resizes.

use futures::future::BoxFuture;
use std::future::Future;
use std::time::Duration;
use tokio::time;

/// Default interval between polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

#[derive(Debug, thiserror::Error)]
pub enum WaitError<E: std::fmt::Display> {
    /// Refresh observed a state that is neither pending nor target
    #[error("unexpected state '{state}', wanted one of {target:?}")]
    UnexpectedState { state: String, target: Vec<String> },

    /// The transition did not complete within the timeout
    #[error("timed out after {timeout:?} waiting for {waiting_for}")]
    Timeout {
        timeout: Duration,
        waiting_for: String,
    },

    /// Refresh itself failed; the wait stops at once
    #[error("{0}")]
    Refresh(E),
}

/// Configuration for a labeled state-machine wait.
///
/// The first refresh happens immediately - a transition that has already
/// completed costs no sleep. When `pending` is non-empty, any observed
/// state outside `pending` and `target` aborts the wait; an empty
/// `pending` set keeps polling through intermediate states.
pub struct StateChangeConf<'a, T, E> {
    pub pending: Vec<String>,
    pub target: Vec<String>,
    pub refresh: Box<dyn FnMut() -> BoxFuture<'a, Result<(T, String), E>> + Send + 'a>,
    pub timeout: Duration,
    pub min_interval: Duration,
}

impl<'a, T, E: std::fmt::Display> StateChangeConf<'a, T, E> {
    pub async fn wait(mut self) -> Result<T, WaitError<E>> {
        let deadline = time::Instant::now() + self.timeout;
        let mut last_state;

        loop {
            let (value, state) = (self.refresh)().await.map_err(WaitError::Refresh)?;

            if self.target.iter().any(|t| *t == state) {
                return Ok(value);
            }

            if !self.pending.is_empty() && !self.pending.iter().any(|p| *p == state) {
                return Err(WaitError::UnexpectedState {
                    state,
                    target: self.target,
                });
            }

            last_state = state;

            let now = time::Instant::now();
            if now >= deadline {
                return Err(WaitError::Timeout {
                    timeout: self.timeout,
                    waiting_for: format!(
                        "state in {:?}, last state '{}'",
                        self.target, last_state
                    ),
                });
            }
            let next = std::cmp::min(now + self.min_interval, deadline);
            time::sleep_until(next).await;
        }
    }
}

/// Polls `refresh` until `predicate` holds for the returned value.
///
/// `waiting_for` names the condition in the timeout error. Refresh errors
/// abort immediately, the first poll is immediate, and the total wait is
/// bounded by `timeout` plus at most one interval.
pub async fn wait_for<T, E, F, Fut, P>(
    waiting_for: &str,
    timeout: Duration,
    min_interval: Duration,
    mut refresh: F,
    predicate: P,
) -> Result<T, WaitError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&T) -> bool,
    E: std::fmt::Display,
{
    let deadline = time::Instant::now() + timeout;

    loop {
        let value = refresh().await.map_err(WaitError::Refresh)?;
        if predicate(&value) {
            return Ok(value);
        }

        let now = time::Instant::now();
        if now >= deadline {
            return Err(WaitError::Timeout {
                timeout,
                waiting_for: waiting_for.to_string(),
            });
        }
        let next = std::cmp::min(now + min_interval, deadline);
        time::sleep_until(next).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug, thiserror::Error)]
    #[error("refresh failed")]
    struct RefreshError;

    #[tokio::test(start_paused = true)]
    async fn target_on_first_refresh_returns_without_sleeping() {
        let start = time::Instant::now();

        let conf = StateChangeConf::<_, RefreshError> {
            pending: vec!["provisioning".to_string()],
            target: vec!["running".to_string()],
            refresh: Box::new(|| async { Ok(("vm-1", "running".to_string())) }.boxed()),
            timeout: Duration::from_secs(600),
            min_interval: DEFAULT_POLL_INTERVAL,
        };

        let value = conf.wait().await.unwrap();
        assert_eq!(value, "vm-1");
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn polls_through_pending_states_until_target() {
        let polls = Arc::new(AtomicU32::new(0));
        let polls_clone = polls.clone();

        let conf = StateChangeConf::<_, RefreshError> {
            pending: vec!["provisioning".to_string()],
            target: vec!["running".to_string()],
            refresh: Box::new(move || {
                let polls = polls_clone.clone();
                async move {
                    let n = polls.fetch_add(1, Ordering::SeqCst);
                    if n < 3 {
                        Ok(("vm-1", "provisioning".to_string()))
                    } else {
                        Ok(("vm-1", "running".to_string()))
                    }
                }
                .boxed()
            }),
            timeout: Duration::from_secs(600),
            min_interval: DEFAULT_POLL_INTERVAL,
        };

        let value = conf.wait().await.unwrap();
        assert_eq!(value, "vm-1");
        assert_eq!(polls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn unexpected_state_aborts_when_pending_given() {
        let conf = StateChangeConf::<_, RefreshError> {
            pending: vec!["provisioning".to_string()],
            target: vec!["running".to_string()],
            refresh: Box::new(|| async { Ok(((), "failed".to_string())) }.boxed()),
            timeout: Duration::from_secs(600),
            min_interval: DEFAULT_POLL_INTERVAL,
        };

        match conf.wait().await {
            Err(WaitError::UnexpectedState { state, .. }) => assert_eq!(state, "failed"),
            other => panic!("expected unexpected-state error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn empty_pending_polls_through_any_state() {
        let polls = Arc::new(AtomicU32::new(0));
        let polls_clone = polls.clone();

        let conf = StateChangeConf::<_, RefreshError> {
            pending: vec![],
            target: vec!["deleted".to_string()],
            refresh: Box::new(move || {
                let polls = polls_clone.clone();
                async move {
                    let n = polls.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Ok(((), "stopping".to_string()))
                    } else {
                        Ok(((), "deleted".to_string()))
                    }
                }
                .boxed()
            }),
            timeout: Duration::from_secs(600),
            min_interval: DEFAULT_POLL_INTERVAL,
        };

        assert!(conf.wait().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn never_target_times_out_within_one_extra_interval() {
        let start = time::Instant::now();
        let timeout = Duration::from_secs(60);

        let conf = StateChangeConf::<_, RefreshError> {
            pending: vec!["provisioning".to_string()],
            target: vec!["running".to_string()],
            refresh: Box::new(|| async { Ok(((), "provisioning".to_string())) }.boxed()),
            timeout,
            min_interval: DEFAULT_POLL_INTERVAL,
        };

        match conf.wait().await {
            Err(WaitError::Timeout { .. }) => {}
            other => panic!("expected timeout, got {:?}", other.map(|_| ())),
        }
        assert!(start.elapsed() >= timeout);
        assert!(start.elapsed() <= timeout + DEFAULT_POLL_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_error_aborts_immediately() {
        let conf = StateChangeConf::<(), _> {
            pending: vec![],
            target: vec!["running".to_string()],
            refresh: Box::new(|| async { Err(RefreshError) }.boxed()),
            timeout: Duration::from_secs(600),
            min_interval: DEFAULT_POLL_INTERVAL,
        };

        assert!(matches!(conf.wait().await, Err(WaitError::Refresh(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_returns_once_predicate_holds() {
        let polls = AtomicU32::new(0);

        let value = wait_for(
            "tags to converge",
            Duration::from_secs(60),
            Duration::from_secs(1),
            || async {
                let n = polls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, RefreshError>(n)
            },
            |n| *n >= 2,
        )
        .await
        .unwrap();

        assert_eq!(value, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_times_out_when_predicate_never_holds() {
        let start = time::Instant::now();
        let timeout = Duration::from_secs(10);

        let result = wait_for(
            "metadata to converge",
            timeout,
            Duration::from_secs(1),
            || async { Ok::<_, RefreshError>(0) },
            |n| *n > 0,
        )
        .await;

        match result {
            Err(WaitError::Timeout { waiting_for, .. }) => {
                assert_eq!(waiting_for, "metadata to converge");
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        assert!(start.elapsed() >= timeout);
    }
}
