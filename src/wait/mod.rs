//! Poll-until-done waiting for long-running zone operations.
//!
//! The waiter polls an operation at a fixed interval (two seconds by default)
//! until the provider reports `DONE`, then inspects the embedded errors. The
//! wait is bounded by a total timeout and an optional attempt budget, can
//! back off between polls, and stops early when its cancellation token
//! fires. Failures while fetching the operation are returned immediately;
//! only the operation's own progress is waited on.

use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::compute::{ComputeApi, Operation, OperationFailure, OperationRef};

/// Default delay between operation polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Default upper bound on the total wait.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(600);

/// Errors surfaced while waiting for an operation.
#[derive(Debug, Error)]
pub enum WaitError<E>
where
    E: std::error::Error + 'static,
{
    /// Raised when the operation status could not be fetched.
    #[error("could not get operation status: {0}")]
    Poll(#[source] E),
    /// Raised when the finished operation carries embedded errors.
    #[error(transparent)]
    Failed(#[from] OperationFailure),
    /// Raised when the operation is still pending after the timeout.
    #[error("timed out after {elapsed:?} waiting for operation {operation}")]
    Timeout {
        /// Operation being waited on.
        operation: String,
        /// Time spent waiting.
        elapsed: Duration,
    },
    /// Raised when the attempt budget is spent before the operation finishes.
    #[error("operation {operation} still pending after {attempts} polls")]
    AttemptsExhausted {
        /// Operation being waited on.
        operation: String,
        /// Number of polls issued.
        attempts: u32,
    },
    /// Raised when the caller cancelled the wait.
    #[error("wait for operation {operation} was cancelled")]
    Cancelled {
        /// Operation being waited on.
        operation: String,
    },
}

/// Timing knobs for [`OperationWaiter`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WaitPolicy {
    /// Delay before the second poll.
    pub poll_interval: Duration,
    /// Ceiling applied to the delay when backing off.
    pub max_poll_interval: Duration,
    /// Multiplier applied to the delay after each poll; `1` keeps it fixed.
    pub backoff_factor: u32,
    /// Upper bound on the total wait.
    pub timeout: Duration,
    /// Optional upper bound on the number of polls.
    pub max_attempts: Option<u32>,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_interval: DEFAULT_POLL_INTERVAL,
            backoff_factor: 1,
            timeout: DEFAULT_WAIT_TIMEOUT,
            max_attempts: None,
        }
    }
}

impl WaitPolicy {
    /// Overrides the initial poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Enables exponential backoff up to `ceiling`.
    #[must_use]
    pub const fn with_backoff(mut self, factor: u32, ceiling: Duration) -> Self {
        self.backoff_factor = factor;
        self.max_poll_interval = ceiling;
        self
    }

    /// Overrides the total wait timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Caps the number of polls.
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    fn next_interval(&self, current: Duration) -> Duration {
        let ceiling = self.max_poll_interval.max(self.poll_interval);
        current
            .saturating_mul(self.backoff_factor.max(1))
            .min(ceiling)
    }
}

/// Blocks until a zone operation reaches `DONE`.
#[derive(Clone, Debug, Default)]
pub struct OperationWaiter {
    policy: WaitPolicy,
}

impl OperationWaiter {
    /// Creates a waiter with the given policy.
    #[must_use]
    pub const fn new(policy: WaitPolicy) -> Self {
        Self { policy }
    }

    /// Returns the active policy.
    #[must_use]
    pub const fn policy(&self) -> &WaitPolicy {
        &self.policy
    }

    /// Polls `operation` until it is done and returns the final snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`WaitError::Poll`] when fetching the operation fails,
    /// [`WaitError::Failed`] when the finished operation carries errors, and
    /// [`WaitError::Timeout`], [`WaitError::AttemptsExhausted`], or
    /// [`WaitError::Cancelled`] when the wait stops before completion.
    pub async fn wait<A>(
        &self,
        api: &A,
        operation: &OperationRef,
        cancel: &CancellationToken,
    ) -> Result<Operation, WaitError<A::Error>>
    where
        A: ComputeApi,
    {
        let started = Instant::now();
        let mut interval = self.policy.poll_interval;
        let mut attempts: u32 = 0;

        loop {
            attempts = attempts.saturating_add(1);
            let snapshot = api
                .get_zone_operation(operation)
                .await
                .map_err(WaitError::Poll)?;

            if snapshot.status.is_done() {
                for message in &snapshot.warnings {
                    warn!(operation = %snapshot.name, "{message}");
                }
                debug!(operation = %snapshot.name, attempts, "operation finished");
                return snapshot.into_result().map_err(WaitError::from);
            }

            debug!(
                operation = %snapshot.name,
                status = %snapshot.status,
                attempts,
                "operation still in progress"
            );

            if self
                .policy
                .max_attempts
                .is_some_and(|limit| attempts >= limit)
            {
                return Err(WaitError::AttemptsExhausted {
                    operation: operation.name.clone(),
                    attempts,
                });
            }

            let elapsed = started.elapsed();
            let remaining = self.policy.timeout.saturating_sub(elapsed);
            if remaining.is_zero() {
                return Err(WaitError::Timeout {
                    operation: operation.name.clone(),
                    elapsed,
                });
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return Err(WaitError::Cancelled {
                        operation: operation.name.clone(),
                    });
                }
                () = sleep(interval.min(remaining)) => {}
            }

            interval = self.policy.next_interval(interval);
        }
    }
}
