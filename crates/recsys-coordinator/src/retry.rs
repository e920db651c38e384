//! Retry classification and execution for provider calls.
//!
//! [`RetryPolicy::classify`] turns a classified [`ServiceError`] into a
//! [`RetryDecision`]; [`RetryPolicy::run`] drives a call through those
//! decisions. Every provider call made by the lifecycle pipelines goes
//! through `run`.

use crate::aws::error::{ServiceError, classify_anyhow_error};
use backon::{BackoffBuilder, ExponentialBuilder};
use recsys_common::defaults::{
    DEFAULT_MAX_ATTEMPTS, IN_USE_BASE_DELAY, MAX_RETRY_DELAY, THROTTLE_BASE_DELAY,
};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// The kind of provider call being made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
    Create,
    Describe,
    Delete,
    /// Polling for a deleted resource to disappear
    AwaitRemoval,
    Upload,
    /// Bucket policy and access role setup
    Configure,
    List,
    FetchMetrics,
}

impl Operation {
    /// Whether not-found means the call already achieved its goal
    pub fn is_removal(self) -> bool {
        matches!(self, Operation::Delete | Operation::AwaitRemoval)
    }
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    /// Try again after `delay`
    Retry,
    /// Stop and report success (the resource is already gone)
    Succeed,
    /// Stop and report the error
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    pub action: RetryAction,
    pub delay: Duration,
}

impl RetryDecision {
    fn retry(delay: Duration) -> Self {
        Self {
            action: RetryAction::Retry,
            delay,
        }
    }

    fn succeed() -> Self {
        Self {
            action: RetryAction::Succeed,
            delay: Duration::ZERO,
        }
    }

    fn fail() -> Self {
        Self {
            action: RetryAction::Fail,
            delay: Duration::ZERO,
        }
    }
}

/// How a successful [`RetryPolicy::run`] ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome<T> {
    /// The call returned a value
    Completed(T),
    /// The call hit not-found during a removal operation
    AlreadyAbsent,
}

/// A successful call plus the number of attempts it took
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempted<T> {
    pub outcome: CallOutcome<T>,
    pub attempts: u32,
}

impl<T> Attempted<T> {
    /// The returned value, if the call completed
    pub fn into_value(self) -> Option<T> {
        match self.outcome {
            CallOutcome::Completed(v) => Some(v),
            CallOutcome::AlreadyAbsent => None,
        }
    }

    pub fn is_already_absent(&self) -> bool {
        matches!(self.outcome, CallOutcome::AlreadyAbsent)
    }
}

/// A call that the policy gave up on
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CallFailure {
    #[error("{operation} failed after {attempts} attempt(s)")]
    Failed {
        operation: Operation,
        attempts: u32,
        #[source]
        source: ServiceError,
    },

    #[error("{operation} cancelled after {attempts} attempt(s)")]
    Cancelled { operation: Operation, attempts: u32 },
}

impl CallFailure {
    pub fn attempts(&self) -> u32 {
        match self {
            CallFailure::Failed { attempts, .. } | CallFailure::Cancelled { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// Bounded retry of transient provider errors.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first
    pub max_attempts: u32,
    /// First delay after a resource-in-use rejection
    pub in_use_delay: Duration,
    /// First delay after throttling
    pub throttle_delay: Duration,
    /// Cap for exponential growth
    pub max_delay: Duration,
    /// Randomize delays
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            in_use_delay: IN_USE_BASE_DELAY,
            throttle_delay: THROTTLE_BASE_DELAY,
            max_delay: MAX_RETRY_DELAY,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Decide what to do after `attempt` (1-based) failed with `error`.
    pub fn classify(
        &self,
        error: &ServiceError,
        operation: Operation,
        attempt: u32,
    ) -> RetryDecision {
        match error {
            ServiceError::NotFound { .. } if operation.is_removal() => RetryDecision::succeed(),
            ServiceError::ResourceInUse { .. } if attempt < self.max_attempts => {
                RetryDecision::retry(self.backoff_delay(self.in_use_delay, attempt))
            }
            ServiceError::Throttled { .. } if attempt < self.max_attempts => {
                RetryDecision::retry(self.backoff_delay(self.throttle_delay, attempt))
            }
            _ => RetryDecision::fail(),
        }
    }

    fn backoff_delay(&self, base: Duration, attempt: u32) -> Duration {
        let mut builder = ExponentialBuilder::default()
            .with_min_delay(base)
            .with_max_delay(self.max_delay)
            .with_factor(2.0)
            .with_max_times(self.max_attempts as usize);
        if self.jitter {
            builder = builder.with_jitter();
        }
        builder
            .build()
            .nth(attempt.saturating_sub(1) as usize)
            .unwrap_or(self.max_delay)
    }

    /// Run `call` until it succeeds or the policy gives up.
    ///
    /// Both the call and the backoff sleep race the cancellation token.
    pub async fn run<T, F, Fut>(
        &self,
        operation: Operation,
        target: &str,
        cancel: &CancellationToken,
        mut call: F,
    ) -> Result<Attempted<T>, CallFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let mut attempt = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(CallFailure::Cancelled {
                    operation,
                    attempts: attempt,
                });
            }

            attempt += 1;
            let result = tokio::select! {
                result = call() => result,
                _ = cancel.cancelled() => {
                    return Err(CallFailure::Cancelled { operation, attempts: attempt });
                }
            };

            let error = match result {
                Ok(value) => {
                    return Ok(Attempted {
                        outcome: CallOutcome::Completed(value),
                        attempts: attempt,
                    });
                }
                Err(e) => e,
            };

            let service = classify_anyhow_error(&error);
            let decision = self.classify(&service, operation, attempt);

            match decision.action {
                RetryAction::Succeed => {
                    debug!(%target, %operation, attempt, "Already absent");
                    return Ok(Attempted {
                        outcome: CallOutcome::AlreadyAbsent,
                        attempts: attempt,
                    });
                }
                RetryAction::Fail => {
                    debug!(%target, %operation, attempt, error = ?error, "Giving up");
                    return Err(CallFailure::Failed {
                        operation,
                        attempts: attempt,
                        source: service,
                    });
                }
                RetryAction::Retry => {
                    warn!(
                        %target,
                        %operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = decision.delay.as_millis(),
                        error = %service,
                        "Transient error, retrying"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(decision.delay) => {}
                        _ = cancel.cancelled() => {
                            return Err(CallFailure::Cancelled { operation, attempts: attempt });
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            jitter: false,
            ..RetryPolicy::default()
        }
    }

    fn in_use() -> ServiceError {
        ServiceError::ResourceInUse {
            message: "busy".to_string(),
        }
    }

    fn not_found() -> ServiceError {
        ServiceError::NotFound {
            message: "gone".to_string(),
        }
    }

    fn throttled() -> ServiceError {
        ServiceError::Throttled {
            message: "slow down".to_string(),
        }
    }

    #[test]
    fn in_use_retries_until_bound() {
        let policy = policy();
        let first = policy.classify(&in_use(), Operation::Delete, 1);
        assert_eq!(first.action, RetryAction::Retry);
        assert_eq!(first.delay, IN_USE_BASE_DELAY);

        let second = policy.classify(&in_use(), Operation::Delete, 2);
        assert_eq!(second.delay, IN_USE_BASE_DELAY * 2);

        let last = policy.classify(&in_use(), Operation::Delete, policy.max_attempts);
        assert_eq!(last.action, RetryAction::Fail);
    }

    #[test]
    fn delays_are_capped() {
        let policy = policy();
        let late = policy.classify(&in_use(), Operation::Delete, policy.max_attempts - 1);
        assert_eq!(late.delay, MAX_RETRY_DELAY);
    }

    #[test]
    fn not_found_depends_on_operation() {
        let policy = policy();
        assert_eq!(
            policy.classify(&not_found(), Operation::Delete, 1).action,
            RetryAction::Succeed
        );
        assert_eq!(
            policy.classify(&not_found(), Operation::AwaitRemoval, 1).action,
            RetryAction::Succeed
        );
        assert_eq!(
            policy.classify(&not_found(), Operation::Describe, 1).action,
            RetryAction::Fail
        );
        assert_eq!(
            policy.classify(&not_found(), Operation::Create, 1).action,
            RetryAction::Fail
        );
    }

    #[test]
    fn throttling_retries_for_any_operation() {
        let policy = policy();
        for op in [
            Operation::Create,
            Operation::Describe,
            Operation::Delete,
            Operation::List,
            Operation::Upload,
        ] {
            let decision = policy.classify(&throttled(), op, 1);
            assert_eq!(decision.action, RetryAction::Retry, "{op}");
            assert_eq!(decision.delay, THROTTLE_BASE_DELAY);
        }
    }

    #[test]
    fn unclassified_errors_fail_immediately() {
        let policy = policy();
        let err = ServiceError::Sdk {
            code: Some("InvalidInputException".to_string()),
            message: "bad".to_string(),
        };
        assert_eq!(
            policy.classify(&err, Operation::Create, 1).action,
            RetryAction::Fail
        );
        let exists = ServiceError::AlreadyExists {
            message: "dup".to_string(),
        };
        assert_eq!(
            policy.classify(&exists, Operation::Create, 1).action,
            RetryAction::Fail
        );
    }

    #[test]
    fn jittered_delay_stays_within_double_base() {
        let policy = RetryPolicy::default();
        let delay = policy.classify(&in_use(), Operation::Delete, 1).delay;
        assert!(delay >= IN_USE_BASE_DELAY);
        assert!(delay <= IN_USE_BASE_DELAY * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn run_retries_in_use_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let start = Instant::now();

        let attempted = policy()
            .run(Operation::Delete, "campaign", &CancellationToken::new(), || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 3 {
                        Err(anyhow::Error::new(in_use()))
                    } else {
                        Ok(())
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(attempted.attempts, 4);
        assert_eq!(attempted.outcome, CallOutcome::Completed(()));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        // 15s + 30s + 60s of backoff
        assert_eq!(start.elapsed(), Duration::from_secs(105));
    }

    #[tokio::test(start_paused = true)]
    async fn run_treats_delete_not_found_as_success_without_retry() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let attempted = policy()
            .run(Operation::Delete, "campaign", &CancellationToken::new(), || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(anyhow::Error::new(not_found())) }
            })
            .await
            .unwrap();

        assert!(attempted.is_already_absent());
        assert_eq!(attempted.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_gives_up_after_max_attempts() {
        let policy = RetryPolicy {
            max_attempts: 3,
            ..policy()
        };
        let failure = policy
            .run(Operation::Delete, "solution", &CancellationToken::new(), || async {
                Err::<(), _>(anyhow::Error::new(in_use()))
            })
            .await
            .unwrap_err();

        assert_eq!(
            failure,
            CallFailure::Failed {
                operation: Operation::Delete,
                attempts: 3,
                source: in_use(),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn run_cancels_during_backoff() {
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let failure = policy()
            .run(Operation::Delete, "solution", &cancel, || async {
                Err::<(), _>(anyhow::Error::new(in_use()))
            })
            .await
            .unwrap_err();

        assert_eq!(
            failure,
            CallFailure::Cancelled {
                operation: Operation::Delete,
                attempts: 1,
            }
        );
    }
}
