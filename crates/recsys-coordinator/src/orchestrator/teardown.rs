//! Reverse-order teardown
//!
//! Walks every recorded handle (confirmed or pending) from Campaign down to
//! DatasetGroup, then removes the bucket and access role. A failing target is
//! recorded and the walk carries on; the report aggregates every failure.

use super::LifecycleOrchestrator;
use super::error::{LifecycleError, Target, TeardownError};
use super::progress::RunObserver;
use crate::aws::{CleanupResult, ResourceClient};
use crate::retry::{Attempted, CallFailure, Operation};
use crate::state::{ManagedResource, RunState, SupportResources};
use recsys_common::{Removal, ResourceKind, ResourceStatus};
use std::future::Future;
use tracing::{debug, info, instrument, warn};

/// What happened to one teardown target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownOutcome {
    pub target: Target,
    pub identifier: Option<String>,
    pub result: CleanupResult,
    /// Delete attempts made; zero when no delete call was needed
    pub attempts: u32,
}

/// Per-target outcomes plus every failure, in the order they happened
#[derive(Debug, Default)]
pub struct TeardownReport {
    pub outcomes: Vec<TeardownOutcome>,
    pub failures: Vec<LifecycleError>,
}

impl TeardownReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Outcome recorded for a target, if it was visited
    pub fn outcome(&self, target: Target) -> Option<&TeardownOutcome> {
        self.outcomes.iter().find(|o| o.target == target)
    }

    pub fn count(&self, result: CleanupResult) -> usize {
        self.outcomes.iter().filter(|o| o.result == result).count()
    }

    pub fn into_result(self) -> Result<Vec<TeardownOutcome>, TeardownError> {
        if self.failures.is_empty() {
            Ok(self.outcomes)
        } else {
            Err(TeardownError {
                failures: self.failures,
            })
        }
    }

    fn succeeded(
        &mut self,
        target: Target,
        identifier: Option<String>,
        result: CleanupResult,
        attempts: u32,
    ) {
        self.outcomes.push(TeardownOutcome {
            target,
            identifier,
            result,
            attempts,
        });
    }

    fn failed(
        &mut self,
        target: Target,
        identifier: Option<String>,
        attempts: u32,
        error: LifecycleError,
    ) -> CleanupResult {
        let result = if error.is_cancelled() {
            CleanupResult::Skipped
        } else {
            CleanupResult::Failed
        };
        warn!(%target, error = %error, "Teardown step failed");
        self.outcomes.push(TeardownOutcome {
            target,
            identifier,
            result,
            attempts,
        });
        self.failures.push(error);
        result
    }
}

/// Delete attempts made before a call gave up
fn attempts_of(error: &LifecycleError) -> u32 {
    match error {
        LifecycleError::Call { source, .. } => source.attempts(),
        _ => 0,
    }
}

impl<C: ResourceClient> LifecycleOrchestrator<C> {
    /// Tear down everything `state` records.
    ///
    /// Each removed target is cleared from `state` right away, so a partial
    /// teardown leaves exactly the survivors behind. Kinds without a handle
    /// get no provider call.
    #[instrument(skip_all, fields(run_id = %state.run_id))]
    pub async fn teardown(
        &self,
        state: &mut RunState,
        observer: &dyn RunObserver,
    ) -> TeardownReport {
        let mut report = TeardownReport::default();
        let targets = state.teardown_targets();
        let support = state.support.clone();

        info!(
            resources = targets.len(),
            support = !support.is_empty(),
            "Starting teardown"
        );

        self.remove_resources(&targets, Some(&mut *state), observer, &mut report)
            .await;
        self.remove_support(&support, Some(state), observer, &mut report)
            .await;

        info!(
            removed = report.outcomes.iter().filter(|o| o.result.is_success()).count(),
            failed = report.failures.len(),
            "Teardown finished"
        );
        report
    }

    /// Remove resources in the order given, recording each outcome
    pub(crate) async fn remove_resources(
        &self,
        targets: &[ManagedResource],
        mut state: Option<&mut RunState>,
        observer: &dyn RunObserver,
        report: &mut TeardownReport,
    ) {
        for resource in targets {
            let target = Target::Resource(resource.kind);
            let identifier = Some(resource.identifier.clone());

            if self.cancel.is_cancelled() {
                let result = report.failed(
                    target,
                    identifier,
                    0,
                    LifecycleError::Cancelled {
                        target,
                        operation: Operation::Delete,
                    },
                );
                observer.step_finished(target, result);
                continue;
            }

            observer.step_started(target);
            let result = match self.remove_resource(resource.kind, &resource.identifier).await {
                Ok((result, attempts)) => {
                    debug!(kind = %resource.kind, identifier = %resource.identifier, %result, attempts, "Removed");
                    report.succeeded(target, identifier, result, attempts);
                    if let Some(state) = state.as_deref_mut() {
                        state.clear(resource.kind);
                        observer.state_changed(state);
                    }
                    result
                }
                Err(e) => {
                    let attempts = attempts_of(&e);
                    report.failed(target, identifier, attempts, e)
                }
            };
            observer.step_finished(target, result);
        }
    }

    /// Remove one provider resource: wait until stable, delete, wait for it
    /// to disappear. Returns the result and the number of delete attempts.
    async fn remove_resource(
        &self,
        kind: ResourceKind,
        identifier: &str,
    ) -> Result<(CleanupResult, u32), LifecycleError> {
        // Waiting for a stable status can take as long as creation did
        let settle = self.timeouts.for_kind(kind).unwrap_or(self.timeouts.removal);

        if kind.has_lifecycle_status() {
            let status = self
                .await_status(
                    kind,
                    identifier,
                    ResourceStatus::DELETABLE,
                    &settle,
                    Operation::AwaitRemoval,
                )
                .await
                .map_err(|e| LifecycleError::from_poll(kind, Operation::Delete, e))?;

            if status == ResourceStatus::Absent {
                return Ok((CleanupResult::AlreadyDeleted, 0));
            }
        }

        if let Removal::WithParent(parent) = kind.removal() {
            debug!(%kind, %parent, "No delete call, removed with parent");
            return Ok((CleanupResult::RemovedWithParent, 0));
        }

        let attempted = self
            .retry
            .run(Operation::Delete, kind.as_str(), &self.cancel, || {
                self.client.delete(kind, identifier)
            })
            .await
            .map_err(|e| LifecycleError::from_call(kind, Operation::Delete, e))?;

        if attempted.is_already_absent() {
            return Ok((CleanupResult::AlreadyDeleted, attempted.attempts));
        }

        if kind.has_lifecycle_status() {
            let status = self
                .await_status(
                    kind,
                    identifier,
                    ResourceStatus::REMOVAL_TERMINAL,
                    &self.timeouts.removal,
                    Operation::AwaitRemoval,
                )
                .await
                .map_err(|e| LifecycleError::from_poll(kind, Operation::AwaitRemoval, e))?;

            if status == ResourceStatus::DeleteFailed {
                return Err(LifecycleError::TerminalStatus {
                    target: Target::Resource(kind),
                    operation: Operation::AwaitRemoval,
                    status,
                });
            }
        }

        Ok((CleanupResult::Deleted, attempted.attempts))
    }

    /// Remove the bucket family and the role family.
    ///
    /// The two families are independent: a failure in one never prevents the
    /// other from being attempted.
    pub(crate) async fn remove_support(
        &self,
        support: &SupportResources,
        mut state: Option<&mut RunState>,
        observer: &dyn RunObserver,
        report: &mut TeardownReport,
    ) {
        if let Some(bucket) = &support.bucket {
            if support.bucket_policy {
                let removed = self
                    .remove_support_step(Target::BucketPolicy, bucket, observer, report, || {
                        self.client.delete_bucket_policy(bucket)
                    })
                    .await;
                if let (true, Some(state)) = (removed, state.as_deref_mut()) {
                    state.support.bucket_policy = false;
                    state.touch();
                    observer.state_changed(state);
                }
            }

            // Deleting the bucket drops its policy too, so go ahead even if
            // the policy step failed
            let removed = self
                .remove_support_step(Target::Bucket, bucket, observer, report, || {
                    self.client.delete_bucket(bucket)
                })
                .await;
            if let (true, Some(state)) = (removed, state.as_deref_mut()) {
                state.support.bucket = None;
                state.support.data_location = None;
                state.support.bucket_policy = false;
                state.touch();
                observer.state_changed(state);
            }
        }

        if let (Some(role_name), true) = (&support.role_name, support.role_adopted) {
            observer.step_started(Target::AccessRole);
            warn!(%role_name, "Keeping access role that predates the run");
            report.succeeded(
                Target::AccessRole,
                Some(role_name.clone()),
                CleanupResult::Retained,
                0,
            );
            observer.step_finished(Target::AccessRole, CleanupResult::Retained);
            if let Some(state) = state.as_deref_mut() {
                state.support.role_name = None;
                state.support.role_arn = None;
                state.support.role_adopted = false;
                state.touch();
                observer.state_changed(state);
            }
        } else if let Some(role_name) = &support.role_name {
            let removed = self
                .remove_support_step(Target::AccessRole, role_name, observer, report, || {
                    self.client.delete_access_role(role_name)
                })
                .await;
            if let (true, Some(state)) = (removed, state.as_deref_mut()) {
                state.support.role_name = None;
                state.support.role_arn = None;
                state.touch();
                observer.state_changed(state);
            }
        }
    }

    /// Run one supporting delete; not-found counts as already deleted
    async fn remove_support_step<F, Fut>(
        &self,
        target: Target,
        name: &str,
        observer: &dyn RunObserver,
        report: &mut TeardownReport,
        call: F,
    ) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let identifier = Some(name.to_string());

        if self.cancel.is_cancelled() {
            let result = report.failed(
                target,
                identifier,
                0,
                LifecycleError::Cancelled {
                    target,
                    operation: Operation::Delete,
                },
            );
            observer.step_finished(target, result);
            return false;
        }

        observer.step_started(target);
        let outcome: Result<Attempted<()>, CallFailure> = self
            .retry
            .run(Operation::Delete, &target.to_string(), &self.cancel, call)
            .await;

        let (result, removed) = match outcome {
            Ok(attempted) => {
                let result = if attempted.is_already_absent() {
                    CleanupResult::AlreadyDeleted
                } else {
                    CleanupResult::Deleted
                };
                report.succeeded(target, identifier, result, attempted.attempts);
                (result, true)
            }
            Err(failure) => {
                let attempts = failure.attempts();
                let error = LifecycleError::from_call(target, Operation::Delete, failure);
                (report.failed(target, identifier, attempts, error), false)
            }
        };
        observer.step_finished(target, result);
        removed
    }
}
