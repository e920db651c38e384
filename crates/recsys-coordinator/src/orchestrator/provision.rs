//! Creation pipeline
//!
//! Stages run strictly in [`ResourceKind`] order and a stage only starts once
//! the previous one is confirmed. A stage that fails, times out or is
//! cancelled stops the pipeline and leaves its handle in the run state's
//! pending slot; nothing is rolled back.

use super::LifecycleOrchestrator;
use super::error::{LifecycleError, Target};
use super::progress::RunObserver;
use crate::aws::personalize::interactions_schema;
use crate::aws::{CreateRequest, ResourceClient};
use crate::dataset::{InteractionStats, ValidationThresholds, validate_interactions};
use crate::retry::Operation;
use crate::state::{ManagedResource, RunState};
use recsys_common::{ResourceKind, ResourceStatus};
use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Campaign throughput floor
const MIN_PROVISIONED_TPS: i32 = 1;

/// Inputs of a provisioning run that are not part of the run state
#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    /// Interaction CSV to validate and upload
    pub data_path: PathBuf,
    pub thresholds: ValidationThresholds,
    /// Bucket to create unless the run state already records one
    pub bucket: String,
}

/// Outcome of a fully successful provisioning run
#[derive(Debug, Clone)]
pub struct ProvisionReport {
    pub run_id: Uuid,
    pub resources: Vec<ManagedResource>,
    /// Offline evaluation metrics; empty when unavailable
    pub metrics: BTreeMap<String, f64>,
    pub training_data: InteractionStats,
}

impl ProvisionReport {
    pub fn campaign(&self) -> Option<&str> {
        self.resources
            .iter()
            .find(|r| r.kind == ResourceKind::Campaign)
            .map(|r| r.identifier.as_str())
    }
}

fn require(
    state: &RunState,
    kind: ResourceKind,
    dependency: ResourceKind,
) -> Result<String, LifecycleError> {
    state
        .identifier(dependency)
        .map(str::to_string)
        .ok_or(LifecycleError::MissingDependency { kind, dependency })
}

/// Build the create call for a stage from the settings and earlier stages
fn create_request(state: &RunState, kind: ResourceKind) -> Result<CreateRequest, LifecycleError> {
    let names = &state.settings.names;
    let request = match kind {
        ResourceKind::DatasetGroup => CreateRequest::DatasetGroup {
            name: names.dataset_group.clone(),
        },
        ResourceKind::Schema => CreateRequest::Schema {
            name: names.schema.clone(),
            definition: interactions_schema(),
        },
        ResourceKind::Dataset => CreateRequest::Dataset {
            name: names.dataset.clone(),
            dataset_group_arn: require(state, kind, ResourceKind::DatasetGroup)?,
            schema_arn: require(state, kind, ResourceKind::Schema)?,
        },
        ResourceKind::ImportJob => {
            let support = &state.support;
            let (Some(data_location), Some(role_arn)) =
                (support.data_location.clone(), support.role_arn.clone())
            else {
                return Err(LifecycleError::MissingDependency {
                    kind,
                    dependency: ResourceKind::Dataset,
                });
            };
            CreateRequest::ImportJob {
                name: names.import_job.clone(),
                dataset_arn: require(state, kind, ResourceKind::Dataset)?,
                data_location,
                role_arn,
            }
        }
        ResourceKind::Solution => CreateRequest::Solution {
            name: names.solution.clone(),
            dataset_group_arn: require(state, kind, ResourceKind::DatasetGroup)?,
            recipe_arn: state.settings.recipe_arn.clone(),
        },
        ResourceKind::SolutionVersion => CreateRequest::SolutionVersion {
            solution_arn: require(state, kind, ResourceKind::Solution)?,
        },
        ResourceKind::Campaign => CreateRequest::Campaign {
            name: names.campaign.clone(),
            solution_version_arn: require(state, kind, ResourceKind::SolutionVersion)?,
            min_provisioned_tps: MIN_PROVISIONED_TPS,
        },
    };
    Ok(request)
}

impl<C: ResourceClient> LifecycleOrchestrator<C> {
    /// Run the creation pipeline, resuming from whatever `state` records.
    ///
    /// Training data is validated before any provider call. Confirmed stages
    /// are skipped; a pending handle is polled instead of created again.
    #[instrument(skip_all, fields(run_id = %state.run_id))]
    pub async fn provision(
        &self,
        state: &mut RunState,
        request: &ProvisionRequest,
        observer: &dyn RunObserver,
    ) -> Result<ProvisionReport, LifecycleError> {
        let training_data = validate_interactions(&request.data_path, &request.thresholds)?;

        self.run_stage(state, ResourceKind::DatasetGroup, observer)
            .await?;
        self.run_stage(state, ResourceKind::Schema, observer).await?;
        self.run_stage(state, ResourceKind::Dataset, observer).await?;
        self.prepare_training_data(state, request, observer).await?;
        self.run_stage(state, ResourceKind::ImportJob, observer).await?;
        self.run_stage(state, ResourceKind::Solution, observer).await?;
        self.run_stage(state, ResourceKind::SolutionVersion, observer)
            .await?;
        let metrics = self.fetch_metrics(state).await;
        self.run_stage(state, ResourceKind::Campaign, observer).await?;

        let resources = state
            .identifiers()
            .iter()
            .map(|(kind, identifier)| ManagedResource {
                kind: *kind,
                identifier: identifier.clone(),
                status: ResourceStatus::Active,
            })
            .collect();

        info!("Provisioning complete");
        Ok(ProvisionReport {
            run_id: state.run_id,
            resources,
            metrics,
            training_data,
        })
    }

    /// Create (or resume) one stage and wait for it to become Active
    async fn run_stage(
        &self,
        state: &mut RunState,
        kind: ResourceKind,
        observer: &dyn RunObserver,
    ) -> Result<(), LifecycleError> {
        if let Some(identifier) = state.identifier(kind) {
            debug!(%kind, %identifier, "Stage already confirmed, skipping");
            return Ok(());
        }

        observer.step_started(Target::Resource(kind));

        let identifier = match state.handle(kind) {
            Some(pending) => {
                info!(%kind, identifier = %pending, "Resuming pending stage");
                pending.to_string()
            }
            None => {
                let request = create_request(state, kind)?;
                let identifier = self
                    .call(Target::Resource(kind), Operation::Create, || {
                        self.client.create(request.clone())
                    })
                    .await?;
                if identifier.is_empty() {
                    return Err(LifecycleError::EmptyIdentifier { kind });
                }
                state.set_pending(kind, identifier.as_str());
                observer.state_changed(state);
                identifier
            }
        };

        if let Some(config) = self.timeouts.for_kind(kind) {
            let status = self
                .await_status(
                    kind,
                    &identifier,
                    ResourceStatus::CREATION_TERMINAL,
                    &config,
                    Operation::Describe,
                )
                .await
                .map_err(|e| LifecycleError::from_poll(kind, Operation::Create, e))?;

            if status != ResourceStatus::Active {
                return Err(LifecycleError::TerminalStatus {
                    target: Target::Resource(kind),
                    operation: Operation::Create,
                    status,
                });
            }
        }

        state.confirm(kind);
        observer.state_changed(state);
        info!(%kind, %identifier, "Stage confirmed");
        Ok(())
    }

    /// Bucket, upload, bucket policy and access role for the import job.
    ///
    /// Each piece is recorded as soon as it exists and skipped on resume.
    async fn prepare_training_data(
        &self,
        state: &mut RunState,
        request: &ProvisionRequest,
        observer: &dyn RunObserver,
    ) -> Result<(), LifecycleError> {
        if state.handle(ResourceKind::ImportJob).is_some() {
            return Ok(());
        }

        let bucket = match state.support.bucket.clone() {
            Some(bucket) => bucket,
            None => {
                observer.step_started(Target::Bucket);
                self.call(Target::Bucket, Operation::Configure, || {
                    self.client.create_bucket(&request.bucket)
                })
                .await?;
                state.support.bucket = Some(request.bucket.clone());
                state.touch();
                observer.state_changed(state);
                request.bucket.clone()
            }
        };

        if state.support.data_location.is_none() {
            observer.step_started(Target::TrainingData);
            let key = state.settings.data_key.clone();
            let location = self
                .call(Target::TrainingData, Operation::Upload, || {
                    self.client
                        .upload_training_data(&bucket, &key, &request.data_path)
                })
                .await?;
            info!(%location, "Training data uploaded");
            state.support.data_location = Some(location);
            state.touch();
            observer.state_changed(state);
        }

        if !state.support.bucket_policy {
            observer.step_started(Target::BucketPolicy);
            self.call(Target::BucketPolicy, Operation::Configure, || {
                self.client.put_bucket_policy(&bucket)
            })
            .await?;
            state.support.bucket_policy = true;
            state.touch();
            observer.state_changed(state);
        }

        if state.support.role_arn.is_none() {
            observer.step_started(Target::AccessRole);
            let role_name = state.settings.role_name.clone();
            let role = self
                .call(Target::AccessRole, Operation::Configure, || {
                    self.client.create_access_role(&role_name)
                })
                .await?;
            if !role.created {
                warn!(%role_name, "Access role predates this run and will be kept on teardown");
            }
            state.support.role_name = Some(role_name);
            state.support.role_arn = Some(role.arn);
            state.support.role_adopted = !role.created;
            state.touch();
            observer.state_changed(state);

            // Policy attachments take a while to propagate
            info!(delay_secs = self.role_settle_delay.as_secs(), "Waiting for access role");
            tokio::select! {
                _ = tokio::time::sleep(self.role_settle_delay) => {}
                _ = self.cancel.cancelled() => {
                    return Err(LifecycleError::Cancelled {
                        target: Target::AccessRole,
                        operation: Operation::Configure,
                    });
                }
            }
        }

        Ok(())
    }

    /// Best-effort metrics of the trained solution version
    async fn fetch_metrics(&self, state: &RunState) -> BTreeMap<String, f64> {
        let Some(version) = state.identifier(ResourceKind::SolutionVersion) else {
            return BTreeMap::new();
        };

        match self
            .retry
            .run(Operation::FetchMetrics, version, &self.cancel, || {
                self.client.solution_metrics(version)
            })
            .await
        {
            Ok(attempted) => {
                let metrics = attempted.into_value().unwrap_or_default();
                for (name, value) in &metrics {
                    info!(metric = %name, value, "Solution metric");
                }
                metrics
            }
            Err(e) => {
                warn!(error = %e, "Solution metrics unavailable");
                BTreeMap::new()
            }
        }
    }

    /// Run a non-removal call through the retry policy
    async fn call<T, F, Fut>(
        &self,
        target: Target,
        operation: Operation,
        f: F,
    ) -> Result<T, LifecycleError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let attempted = self
            .retry
            .run(operation, &target.to_string(), &self.cancel, f)
            .await
            .map_err(|e| LifecycleError::from_call(target, operation, e))?;

        attempted
            .into_value()
            .ok_or(LifecycleError::TerminalStatus {
                target,
                operation,
                status: ResourceStatus::Absent,
            })
    }
}
