//! Generic state-change poller for long-running server operations.
//!
//! A [`StateChangeConf`] describes which states are still in progress and which
//! are terminal. [`StateChangeConf::wait_for_state`] sleeps `delay`, then calls
//! the refresh closure with exponential back-off until a target state shows up,
//! an unexpected state is seen, the budget runs out, or the caller cancels.

use crate::config::PollPolicy;
use crate::error::{AzdoError, AzdoResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct StateChangeConf {
    /// Used in logs and errors, e.g. `service endpoint 1234 readiness`.
    pub operation: String,
    pub delay: Duration,
    pub min_timeout: Duration,
    pub pending: Vec<String>,
    pub target: Vec<String>,
    /// `None` waits until a terminal state is reached.
    pub timeout: Option<Duration>,
}

impl StateChangeConf {
    pub fn new(operation: impl Into<String>, policy: PollPolicy) -> Self {
        Self {
            operation: operation.into(),
            delay: policy.delay,
            min_timeout: policy.min_timeout,
            pending: Vec::new(),
            target: Vec::new(),
            timeout: policy.timeout,
        }
    }

    pub fn pending<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pending = states.into_iter().map(Into::into).collect();
        self
    }

    pub fn target<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target = states.into_iter().map(Into::into).collect();
        self
    }

    /// Wait between the `attempt`-th and next refresh.
    fn backoff_duration(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        INITIAL_BACKOFF
            .saturating_mul(factor)
            .min(MAX_BACKOFF)
            .max(self.min_timeout)
    }

    /// Poll `refresh` until a target state is returned.
    ///
    /// `refresh` yields the current object and its state. A refresh that is
    /// already running is never interrupted; cancellation is checked while
    /// sleeping between polls.
    pub async fn wait_for_state<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut refresh: F,
    ) -> AzdoResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AzdoResult<(T, String)>>,
    {
        let started = Instant::now();
        let deadline = self.timeout.map(|t| started + t);
        let mut last_state: Option<String> = None;
        let mut attempt = 0u32;

        info!(operation = %self.operation, target = ?self.target, "Waiting for state change");

        self.pause(cancel, self.delay, deadline, started, &last_state)
            .await?;

        loop {
            let (result, state) = refresh().await?;
            debug!(operation = %self.operation, state = %state, attempt, "Polled state");

            if self.target.iter().any(|t| t == &state) {
                info!(
                    operation = %self.operation,
                    state = %state,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Reached target state"
                );
                return Ok(result);
            }
            if !self.pending.iter().any(|p| p == &state) {
                return Err(AzdoError::UnexpectedState {
                    operation: self.operation.clone(),
                    state,
                    expected: self.target.clone(),
                });
            }
            last_state = Some(state);

            if let Some(deadline) = deadline
                && Instant::now() >= deadline
            {
                return Err(self.timed_out(started, last_state));
            }

            let wait = self.backoff_duration(attempt);
            attempt += 1;
            self.pause(cancel, wait, deadline, started, &last_state)
                .await?;
        }
    }

    /// Sleep for `wait`, cut short by the deadline or by cancellation.
    async fn pause(
        &self,
        cancel: &CancellationToken,
        wait: Duration,
        deadline: Option<Instant>,
        started: Instant,
        last_state: &Option<String>,
    ) -> AzdoResult<()> {
        let mut wake = Instant::now() + wait;
        let mut expires = false;
        if let Some(deadline) = deadline
            && deadline < wake
        {
            wake = deadline;
            expires = true;
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                info!(operation = %self.operation, "Wait cancelled");
                Err(AzdoError::Cancelled)
            }
            _ = tokio::time::sleep_until(wake) => {
                if expires {
                    Err(self.timed_out(started, last_state.clone()))
                } else {
                    Ok(())
                }
            }
        }
    }

    fn timed_out(&self, started: Instant, last_state: Option<String>) -> AzdoError {
        AzdoError::Timeout {
            operation: self.operation.clone(),
            elapsed: started.elapsed(),
            last_state,
        }
    }
}

/// Sleep that yields [`AzdoError::Cancelled`] if the token fires first.
pub async fn cancellable_sleep(cancel: &CancellationToken, wait: Duration) -> AzdoResult<()> {
    tokio::select! {
        _ = cancel.cancelled() => Err(AzdoError::Cancelled),
        _ = sleep(wait) => Ok(()),
    }
}
