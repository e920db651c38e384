//! Stage-scoped lifecycle errors

use crate::aws::error::ServiceError;
use crate::dataset::ValidationError;
use crate::retry::{CallFailure, Operation};
use crate::wait::PollError;
use recsys_common::{ResourceKind, ResourceStatus};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// What a lifecycle step acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Resource(ResourceKind),
    TrainingData,
    Bucket,
    BucketPolicy,
    AccessRole,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Resource(kind) => write!(f, "{kind}"),
            Target::TrainingData => f.write_str("training_data"),
            Target::Bucket => f.write_str("bucket"),
            Target::BucketPolicy => f.write_str("bucket_policy"),
            Target::AccessRole => f.write_str("access_role"),
        }
    }
}

impl From<ResourceKind> for Target {
    fn from(kind: ResourceKind) -> Self {
        Target::Resource(kind)
    }
}

fn describe_last(status: &Option<ResourceStatus>) -> String {
    status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// A failure tied to the target and operation it happened in
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Training data failed validation; nothing was created
    #[error("training data rejected")]
    Validation(#[from] ValidationError),

    /// A provider call failed for good
    #[error("{operation} {target} failed")]
    Call {
        target: Target,
        operation: Operation,
        #[source]
        source: CallFailure,
    },

    /// The provider reported a status the step cannot continue from
    #[error("{target} reached {status} during {operation}")]
    TerminalStatus {
        target: Target,
        operation: Operation,
        status: ResourceStatus,
    },

    /// The ceiling elapsed; the resource needs manual inspection
    #[error("{target} did not settle within {timeout:?} during {operation} (last status: {})", describe_last(last_status))]
    DeadlineExceeded {
        target: Target,
        operation: Operation,
        timeout: Duration,
        last_status: Option<ResourceStatus>,
    },

    #[error("{operation} {target} cancelled")]
    Cancelled { target: Target, operation: Operation },

    /// A create call returned no identifier
    #[error("create {kind} returned an empty identifier")]
    EmptyIdentifier { kind: ResourceKind },

    /// A stage ran before the stage it depends on was confirmed
    #[error("{kind} requires a confirmed {dependency}")]
    MissingDependency {
        kind: ResourceKind,
        dependency: ResourceKind,
    },
}

impl LifecycleError {
    /// Wrap a retry failure with its target
    pub fn from_call(target: impl Into<Target>, operation: Operation, failure: CallFailure) -> Self {
        let target = target.into();
        match failure {
            CallFailure::Cancelled { .. } => LifecycleError::Cancelled { target, operation },
            failure => LifecycleError::Call {
                target,
                operation,
                source: failure,
            },
        }
    }

    /// Wrap a poll failure with its target
    pub fn from_poll(target: impl Into<Target>, operation: Operation, error: PollError) -> Self {
        let target = target.into();
        match error {
            PollError::DeadlineExceeded {
                last_status,
                timeout,
            } => LifecycleError::DeadlineExceeded {
                target,
                operation,
                timeout,
                last_status,
            },
            PollError::Cancelled => LifecycleError::Cancelled { target, operation },
            PollError::Describe(source) => LifecycleError::Call {
                target,
                operation,
                source: CallFailure::Failed {
                    operation: Operation::Describe,
                    attempts: 1,
                    source,
                },
            },
        }
    }

    /// Target the error is scoped to, if any
    pub fn target(&self) -> Option<Target> {
        match self {
            LifecycleError::Validation(_) => Some(Target::TrainingData),
            LifecycleError::Call { target, .. }
            | LifecycleError::TerminalStatus { target, .. }
            | LifecycleError::DeadlineExceeded { target, .. }
            | LifecycleError::Cancelled { target, .. } => Some(*target),
            LifecycleError::EmptyIdentifier { kind }
            | LifecycleError::MissingDependency { kind, .. } => Some(Target::Resource(*kind)),
        }
    }

    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, LifecycleError::DeadlineExceeded { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, LifecycleError::Cancelled { .. })
    }

    /// Provider error underneath, if this came from a provider call
    pub fn service_error(&self) -> Option<&ServiceError> {
        match self {
            LifecycleError::Call {
                source: CallFailure::Failed { source, .. },
                ..
            } => Some(source),
            _ => None,
        }
    }
}

/// Aggregated teardown failures
#[derive(Debug, Error)]
#[error("teardown left {} target(s) behind: {}", failures.len(), summarize(failures))]
pub struct TeardownError {
    pub failures: Vec<LifecycleError>,
}

fn summarize(failures: &[LifecycleError]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_call_becomes_cancelled() {
        let err = LifecycleError::from_call(
            ResourceKind::Campaign,
            Operation::Delete,
            CallFailure::Cancelled {
                operation: Operation::Delete,
                attempts: 2,
            },
        );
        assert!(err.is_cancelled());
        assert_eq!(err.target(), Some(Target::Resource(ResourceKind::Campaign)));
    }

    #[test]
    fn deadline_message_names_stage_and_status() {
        let err = LifecycleError::from_poll(
            ResourceKind::SolutionVersion,
            Operation::Create,
            PollError::DeadlineExceeded {
                last_status: Some(ResourceStatus::InProgress),
                timeout: Duration::from_secs(60),
            },
        );
        assert!(err.is_deadline_exceeded());
        let message = err.to_string();
        assert!(message.contains("solution_version"), "{message}");
        assert!(message.contains("in_progress"), "{message}");
    }

    #[test]
    fn teardown_error_lists_every_failure() {
        let err = TeardownError {
            failures: vec![
                LifecycleError::Cancelled {
                    target: Target::Bucket,
                    operation: Operation::Delete,
                },
                LifecycleError::TerminalStatus {
                    target: Target::Resource(ResourceKind::Solution),
                    operation: Operation::AwaitRemoval,
                    status: ResourceStatus::Failed,
                },
            ],
        };
        let message = err.to_string();
        assert!(message.starts_with("teardown left 2 target(s) behind"));
        assert!(message.contains("bucket"));
        assert!(message.contains("solution reached failed"));
    }
}
