//! Recommendation service (Amazon Personalize) resource management
//!
//! Every resource is addressed by the ARN returned from its create call.
//! Errors carry a classified [`ServiceError`](crate::aws::error::ServiceError)
//! in their context chain so the retry policy can reason about them.

use crate::aws::client::{CreateRequest, ResourceSummary};
use crate::aws::context::AwsContext;
use crate::aws::error::from_sdk_error;
use anyhow::{Context, Result};
use aws_sdk_personalize::Client;
use aws_sdk_personalize::types::{CampaignConfig, DataSource};
use recsys_common::defaults::INTERACTIONS_DATASET_TYPE;
use recsys_common::{ResourceKind, ResourceStatus};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Item exploration settings for new campaigns
const EXPLORATION_WEIGHT: &str = "0.3";
const EXPLORATION_ITEM_AGE_CUT_OFF: &str = "30";

/// Avro schema of the interactions dataset
pub fn interactions_schema() -> String {
    serde_json::json!({
        "type": "record",
        "name": "Interactions",
        "namespace": "com.amazonaws.personalize.schema",
        "fields": [
            { "name": "USER_ID", "type": "string" },
            { "name": "ITEM_ID", "type": "string" },
            { "name": "EVENT_TYPE", "type": "string" },
            { "name": "TIMESTAMP", "type": "long" }
        ],
        "version": "1.0"
    })
    .to_string()
}

/// Personalize client for the managed resource chain
pub struct PersonalizeClient {
    client: Client,
}

fn status_of(raw: Option<&str>) -> ResourceStatus {
    ResourceStatus::from_provider(raw.unwrap_or_default())
}

fn returned_arn(kind: ResourceKind, arn: Option<&str>) -> Result<String> {
    arn.map(str::to_string)
        .with_context(|| format!("Create {} returned no ARN", kind))
}

impl PersonalizeClient {
    /// Create a Personalize client from a pre-loaded AWS context
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.personalize_client(),
        }
    }

    /// Issue the create call for a resource, returning its ARN
    pub async fn create(&self, request: CreateRequest) -> Result<String> {
        let kind = request.kind();
        info!(kind = %kind, "Creating resource");

        let arn = match request {
            CreateRequest::DatasetGroup { name } => {
                let out = self
                    .client
                    .create_dataset_group()
                    .name(name)
                    .send()
                    .await
                    .map_err(from_sdk_error)
                    .context("Failed to create dataset group")?;
                returned_arn(kind, out.dataset_group_arn())?
            }
            CreateRequest::Schema { name, definition } => {
                let out = self
                    .client
                    .create_schema()
                    .name(name)
                    .schema(definition)
                    .send()
                    .await
                    .map_err(from_sdk_error)
                    .context("Failed to create schema")?;
                returned_arn(kind, out.schema_arn())?
            }
            CreateRequest::Dataset {
                name,
                dataset_group_arn,
                schema_arn,
            } => {
                let out = self
                    .client
                    .create_dataset()
                    .name(name)
                    .dataset_type(INTERACTIONS_DATASET_TYPE)
                    .dataset_group_arn(dataset_group_arn)
                    .schema_arn(schema_arn)
                    .send()
                    .await
                    .map_err(from_sdk_error)
                    .context("Failed to create dataset")?;
                returned_arn(kind, out.dataset_arn())?
            }
            CreateRequest::ImportJob {
                name,
                dataset_arn,
                data_location,
                role_arn,
            } => {
                let out = self
                    .client
                    .create_dataset_import_job()
                    .job_name(name)
                    .dataset_arn(dataset_arn)
                    .data_source(DataSource::builder().data_location(data_location).build())
                    .role_arn(role_arn)
                    .send()
                    .await
                    .map_err(from_sdk_error)
                    .context("Failed to create dataset import job")?;
                returned_arn(kind, out.dataset_import_job_arn())?
            }
            CreateRequest::Solution {
                name,
                dataset_group_arn,
                recipe_arn,
            } => {
                let out = self
                    .client
                    .create_solution()
                    .name(name)
                    .dataset_group_arn(dataset_group_arn)
                    .recipe_arn(recipe_arn)
                    .send()
                    .await
                    .map_err(from_sdk_error)
                    .context("Failed to create solution")?;
                returned_arn(kind, out.solution_arn())?
            }
            CreateRequest::SolutionVersion { solution_arn } => {
                let out = self
                    .client
                    .create_solution_version()
                    .solution_arn(solution_arn)
                    .send()
                    .await
                    .map_err(from_sdk_error)
                    .context("Failed to create solution version")?;
                returned_arn(kind, out.solution_version_arn())?
            }
            CreateRequest::Campaign {
                name,
                solution_version_arn,
                min_provisioned_tps,
            } => {
                let config = CampaignConfig::builder()
                    .item_exploration_config("explorationWeight", EXPLORATION_WEIGHT)
                    .item_exploration_config(
                        "explorationItemAgeCutOff",
                        EXPLORATION_ITEM_AGE_CUT_OFF,
                    )
                    .build();
                let out = self
                    .client
                    .create_campaign()
                    .name(name)
                    .solution_version_arn(solution_version_arn)
                    .min_provisioned_tps(min_provisioned_tps)
                    .campaign_config(config)
                    .send()
                    .await
                    .map_err(from_sdk_error)
                    .context("Failed to create campaign")?;
                returned_arn(kind, out.campaign_arn())?
            }
        };

        info!(kind = %kind, arn = %arn, "Resource created");
        Ok(arn)
    }

    /// Describe a resource and map its provider status
    pub async fn describe(&self, kind: ResourceKind, arn: &str) -> Result<ResourceStatus> {
        let raw = match kind {
            ResourceKind::DatasetGroup => self
                .client
                .describe_dataset_group()
                .dataset_group_arn(arn)
                .send()
                .await
                .map_err(from_sdk_error)
                .context("Failed to describe dataset group")?
                .dataset_group()
                .and_then(|r| r.status().map(str::to_string)),
            ResourceKind::Schema => {
                // Schemas have no lifecycle: existing means ready
                self.client
                    .describe_schema()
                    .schema_arn(arn)
                    .send()
                    .await
                    .map_err(from_sdk_error)
                    .context("Failed to describe schema")?;
                return Ok(ResourceStatus::Active);
            }
            ResourceKind::Dataset => self
                .client
                .describe_dataset()
                .dataset_arn(arn)
                .send()
                .await
                .map_err(from_sdk_error)
                .context("Failed to describe dataset")?
                .dataset()
                .and_then(|r| r.status().map(str::to_string)),
            ResourceKind::ImportJob => self
                .client
                .describe_dataset_import_job()
                .dataset_import_job_arn(arn)
                .send()
                .await
                .map_err(from_sdk_error)
                .context("Failed to describe dataset import job")?
                .dataset_import_job()
                .and_then(|r| r.status().map(str::to_string)),
            ResourceKind::Solution => self
                .client
                .describe_solution()
                .solution_arn(arn)
                .send()
                .await
                .map_err(from_sdk_error)
                .context("Failed to describe solution")?
                .solution()
                .and_then(|r| r.status().map(str::to_string)),
            ResourceKind::SolutionVersion => self
                .client
                .describe_solution_version()
                .solution_version_arn(arn)
                .send()
                .await
                .map_err(from_sdk_error)
                .context("Failed to describe solution version")?
                .solution_version()
                .and_then(|r| r.status().map(str::to_string)),
            ResourceKind::Campaign => self
                .client
                .describe_campaign()
                .campaign_arn(arn)
                .send()
                .await
                .map_err(from_sdk_error)
                .context("Failed to describe campaign")?
                .campaign()
                .and_then(|r| r.status().map(str::to_string)),
        };

        let status = status_of(raw.as_deref());
        debug!(kind = %kind, arn = %arn, raw = ?raw, status = %status, "Described resource");
        Ok(status)
    }

    /// Delete a resource.
    ///
    /// Import jobs and solution versions have no delete call; they go away
    /// with their dataset or solution, so this is a no-op for them.
    pub async fn delete(&self, kind: ResourceKind, arn: &str) -> Result<()> {
        info!(kind = %kind, arn = %arn, "Deleting resource");

        match kind {
            ResourceKind::DatasetGroup => {
                self.client
                    .delete_dataset_group()
                    .dataset_group_arn(arn)
                    .send()
                    .await
                    .map_err(from_sdk_error)
                    .context("Failed to delete dataset group")?;
            }
            ResourceKind::Schema => {
                self.client
                    .delete_schema()
                    .schema_arn(arn)
                    .send()
                    .await
                    .map_err(from_sdk_error)
                    .context("Failed to delete schema")?;
            }
            ResourceKind::Dataset => {
                self.client
                    .delete_dataset()
                    .dataset_arn(arn)
                    .send()
                    .await
                    .map_err(from_sdk_error)
                    .context("Failed to delete dataset")?;
            }
            ResourceKind::Solution => {
                self.client
                    .delete_solution()
                    .solution_arn(arn)
                    .send()
                    .await
                    .map_err(from_sdk_error)
                    .context("Failed to delete solution")?;
            }
            ResourceKind::Campaign => {
                self.client
                    .delete_campaign()
                    .campaign_arn(arn)
                    .send()
                    .await
                    .map_err(from_sdk_error)
                    .context("Failed to delete campaign")?;
            }
            ResourceKind::ImportJob | ResourceKind::SolutionVersion => {
                debug!(kind = %kind, "No delete call, removed with parent");
            }
        }

        Ok(())
    }

    /// List resources of a kind, optionally scoped to a parent ARN.
    ///
    /// Datasets and solutions are scoped by dataset group, import jobs by
    /// dataset, solution versions and campaigns by solution. Dataset groups
    /// and schemas ignore the parent.
    pub async fn list(
        &self,
        kind: ResourceKind,
        parent: Option<&str>,
    ) -> Result<Vec<ResourceSummary>> {
        let mut summaries = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            next_token = match kind {
                ResourceKind::DatasetGroup => {
                    let out = self
                        .client
                        .list_dataset_groups()
                        .set_next_token(next_token)
                        .send()
                        .await
                        .map_err(from_sdk_error)
                        .context("Failed to list dataset groups")?;
                    summaries.extend(out.dataset_groups().iter().filter_map(|s| {
                        ResourceSummary::from_parts(
                            kind,
                            s.name(),
                            s.dataset_group_arn(),
                            status_of(s.status()),
                        )
                    }));
                    out.next_token().map(str::to_string)
                }
                ResourceKind::Schema => {
                    let out = self
                        .client
                        .list_schemas()
                        .set_next_token(next_token)
                        .send()
                        .await
                        .map_err(from_sdk_error)
                        .context("Failed to list schemas")?;
                    summaries.extend(out.schemas().iter().filter_map(|s| {
                        ResourceSummary::from_parts(
                            kind,
                            s.name(),
                            s.schema_arn(),
                            ResourceStatus::Active,
                        )
                    }));
                    out.next_token().map(str::to_string)
                }
                ResourceKind::Dataset => {
                    let out = self
                        .client
                        .list_datasets()
                        .set_dataset_group_arn(parent.map(str::to_string))
                        .set_next_token(next_token)
                        .send()
                        .await
                        .map_err(from_sdk_error)
                        .context("Failed to list datasets")?;
                    summaries.extend(out.datasets().iter().filter_map(|s| {
                        ResourceSummary::from_parts(
                            kind,
                            s.name(),
                            s.dataset_arn(),
                            status_of(s.status()),
                        )
                    }));
                    out.next_token().map(str::to_string)
                }
                ResourceKind::ImportJob => {
                    let out = self
                        .client
                        .list_dataset_import_jobs()
                        .set_dataset_arn(parent.map(str::to_string))
                        .set_next_token(next_token)
                        .send()
                        .await
                        .map_err(from_sdk_error)
                        .context("Failed to list dataset import jobs")?;
                    summaries.extend(out.dataset_import_jobs().iter().filter_map(|s| {
                        ResourceSummary::from_parts(
                            kind,
                            s.job_name(),
                            s.dataset_import_job_arn(),
                            status_of(s.status()),
                        )
                    }));
                    out.next_token().map(str::to_string)
                }
                ResourceKind::Solution => {
                    let out = self
                        .client
                        .list_solutions()
                        .set_dataset_group_arn(parent.map(str::to_string))
                        .set_next_token(next_token)
                        .send()
                        .await
                        .map_err(from_sdk_error)
                        .context("Failed to list solutions")?;
                    summaries.extend(out.solutions().iter().filter_map(|s| {
                        ResourceSummary::from_parts(
                            kind,
                            s.name(),
                            s.solution_arn(),
                            status_of(s.status()),
                        )
                    }));
                    out.next_token().map(str::to_string)
                }
                ResourceKind::SolutionVersion => {
                    let out = self
                        .client
                        .list_solution_versions()
                        .set_solution_arn(parent.map(str::to_string))
                        .set_next_token(next_token)
                        .send()
                        .await
                        .map_err(from_sdk_error)
                        .context("Failed to list solution versions")?;
                    summaries.extend(out.solution_versions().iter().filter_map(|s| {
                        ResourceSummary::from_parts(
                            kind,
                            None,
                            s.solution_version_arn(),
                            status_of(s.status()),
                        )
                    }));
                    out.next_token().map(str::to_string)
                }
                ResourceKind::Campaign => {
                    let out = self
                        .client
                        .list_campaigns()
                        .set_solution_arn(parent.map(str::to_string))
                        .set_next_token(next_token)
                        .send()
                        .await
                        .map_err(from_sdk_error)
                        .context("Failed to list campaigns")?;
                    summaries.extend(out.campaigns().iter().filter_map(|s| {
                        ResourceSummary::from_parts(
                            kind,
                            s.name(),
                            s.campaign_arn(),
                            status_of(s.status()),
                        )
                    }));
                    out.next_token().map(str::to_string)
                }
            };

            if next_token.is_none() {
                break;
            }
        }

        debug!(kind = %kind, parent = ?parent, count = summaries.len(), "Listed resources");
        Ok(summaries)
    }

    /// Fetch the offline evaluation metrics of a trained solution version
    pub async fn solution_metrics(&self, solution_version_arn: &str) -> Result<BTreeMap<String, f64>> {
        let out = self
            .client
            .get_solution_metrics()
            .solution_version_arn(solution_version_arn)
            .send()
            .await
            .map_err(from_sdk_error)
            .context("Failed to get solution metrics")?;

        Ok(out
            .metrics()
            .map(|m| m.iter().map(|(k, v)| (k.clone(), *v)).collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_lists_interaction_columns() {
        let schema: serde_json::Value = serde_json::from_str(&interactions_schema()).unwrap();
        let fields: Vec<_> = schema["fields"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(fields, ["USER_ID", "ITEM_ID", "EVENT_TYPE", "TIMESTAMP"]);
        assert_eq!(schema["fields"][3]["type"], "long");
    }

    #[test]
    fn missing_status_keeps_polling() {
        assert_eq!(status_of(None), ResourceStatus::InProgress);
        assert_eq!(status_of(Some("ACTIVE")), ResourceStatus::Active);
    }
}
