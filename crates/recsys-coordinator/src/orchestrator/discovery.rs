//! Discovery of leftover resources by name
//!
//! Used when no run state survives: dataset groups are matched by name and
//! everything under them is listed, schemas are matched by name. The result
//! goes through the same removal steps as a regular teardown.

use super::LifecycleOrchestrator;
use super::error::{LifecycleError, Target};
use super::progress::RunObserver;
use super::teardown::TeardownReport;
use crate::aws::{ResourceClient, ResourceSummary};
use crate::retry::Operation;
use crate::state::{ManagedResource, ResourceNames, SupportResources};
use comfy_table::{Cell, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use recsys_common::ResourceKind;
use std::cmp::Reverse;
use tracing::{debug, info, instrument};

/// Resources found by listing, in teardown order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovered {
    pub resources: Vec<ManagedResource>,
}

impl Discovered {
    fn new(mut resources: Vec<ManagedResource>) -> Self {
        // Stable, so children keep their listing order within a kind
        resources.sort_by_key(|r| Reverse(r.kind));
        Self { resources }
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("Resource"),
                Cell::new("Status"),
                Cell::new("Identifier"),
            ]);
        for resource in &self.resources {
            table.add_row(vec![
                Cell::new(resource.kind.as_str()),
                Cell::new(resource.status.to_string()),
                Cell::new(&resource.identifier),
            ]);
        }
        table
    }
}

/// Supporting resources a run with these settings would have created.
///
/// The bucket policy is always included; deleting a missing one is a no-op.
pub fn derived_support(bucket: impl Into<String>, role_name: impl Into<String>) -> SupportResources {
    SupportResources {
        bucket: Some(bucket.into()),
        data_location: None,
        bucket_policy: true,
        role_name: Some(role_name.into()),
        role_arn: None,
        role_adopted: false,
    }
}

fn managed(summary: ResourceSummary) -> ManagedResource {
    ManagedResource {
        kind: summary.kind,
        identifier: summary.identifier,
        status: summary.status,
    }
}

impl<C: ResourceClient> LifecycleOrchestrator<C> {
    /// Find every resource belonging to a chain with the given names.
    ///
    /// Only the dataset group and schema are matched by name; everything
    /// listed under a matching group belongs to it.
    #[instrument(skip_all, fields(dataset_group = %names.dataset_group))]
    pub async fn discover(&self, names: &ResourceNames) -> Result<Discovered, LifecycleError> {
        let mut found = Vec::new();

        let groups: Vec<_> = self
            .list(ResourceKind::DatasetGroup, None)
            .await?
            .into_iter()
            .filter(|g| g.name.as_deref() == Some(names.dataset_group.as_str()))
            .collect();

        for group in groups {
            debug!(identifier = %group.identifier, "Matched dataset group");

            for solution in self
                .list(ResourceKind::Solution, Some(&group.identifier))
                .await?
            {
                for kind in [ResourceKind::Campaign, ResourceKind::SolutionVersion] {
                    let children = self.list(kind, Some(&solution.identifier)).await?;
                    found.extend(children.into_iter().map(managed));
                }
                found.push(managed(solution));
            }

            for dataset in self
                .list(ResourceKind::Dataset, Some(&group.identifier))
                .await?
            {
                let jobs = self
                    .list(ResourceKind::ImportJob, Some(&dataset.identifier))
                    .await?;
                found.extend(jobs.into_iter().map(managed));
                found.push(managed(dataset));
            }

            found.push(managed(group));
        }

        let schema_name = names.schema.to_lowercase();
        found.extend(
            self.list(ResourceKind::Schema, None)
                .await?
                .into_iter()
                .filter(|s| {
                    s.name
                        .as_deref()
                        .is_some_and(|n| n.to_lowercase().contains(&schema_name))
                })
                .map(managed),
        );

        let discovered = Discovered::new(found);
        info!(count = discovered.len(), "Discovery finished");
        Ok(discovered)
    }

    /// Remove discovered resources, then the supporting resources
    #[instrument(skip_all, fields(count = discovered.len()))]
    pub async fn remove_discovered(
        &self,
        discovered: &Discovered,
        support: &SupportResources,
        observer: &dyn RunObserver,
    ) -> TeardownReport {
        let mut report = TeardownReport::default();
        self.remove_resources(&discovered.resources, None, observer, &mut report)
            .await;
        self.remove_support(support, None, observer, &mut report)
            .await;
        report
    }

    async fn list(
        &self,
        kind: ResourceKind,
        parent: Option<&str>,
    ) -> Result<Vec<ResourceSummary>, LifecycleError> {
        let attempted = self
            .retry
            .run(Operation::List, kind.as_str(), &self.cancel, || {
                self.client.list(kind, parent.map(str::to_string))
            })
            .await
            .map_err(|e| LifecycleError::from_call(Target::Resource(kind), Operation::List, e))?;
        Ok(attempted.into_value().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::CleanupResult;
    use crate::orchestrator::LogObserver;
    use crate::testing::{Call, FakeClient, test_orchestrator};
    use recsys_common::ResourceStatus;

    fn summary(kind: ResourceKind, name: &str, identifier: &str) -> ResourceSummary {
        ResourceSummary {
            kind,
            name: Some(name.to_string()),
            identifier: identifier.to_string(),
            status: ResourceStatus::Active,
        }
    }

    /// One matching chain plus an unrelated dataset group and schema
    fn populated_client(names: &ResourceNames) -> FakeClient {
        let client = FakeClient::new();
        client.with_listing(
            ResourceKind::DatasetGroup,
            None,
            vec![
                summary(ResourceKind::DatasetGroup, &names.dataset_group, "arn:dsg"),
                summary(ResourceKind::DatasetGroup, "someone-else", "arn:other-dsg"),
            ],
        );
        client.with_listing(
            ResourceKind::Solution,
            Some("arn:dsg"),
            vec![summary(ResourceKind::Solution, &names.solution, "arn:sol")],
        );
        client.with_listing(
            ResourceKind::Campaign,
            Some("arn:sol"),
            vec![summary(ResourceKind::Campaign, &names.campaign, "arn:camp")],
        );
        client.with_listing(
            ResourceKind::SolutionVersion,
            Some("arn:sol"),
            vec![
                summary(ResourceKind::SolutionVersion, "", "arn:sol/v1"),
                summary(ResourceKind::SolutionVersion, "", "arn:sol/v2"),
            ],
        );
        client.with_listing(
            ResourceKind::Dataset,
            Some("arn:dsg"),
            vec![summary(ResourceKind::Dataset, &names.dataset, "arn:ds")],
        );
        client.with_listing(
            ResourceKind::ImportJob,
            Some("arn:ds"),
            vec![summary(ResourceKind::ImportJob, &names.import_job, "arn:job")],
        );
        client.with_listing(
            ResourceKind::Schema,
            None,
            vec![
                summary(ResourceKind::Schema, "IT-Service-Schema", "arn:schema"),
                summary(ResourceKind::Schema, "unrelated", "arn:other-schema"),
            ],
        );
        client
    }

    #[tokio::test(start_paused = true)]
    async fn discovers_matching_chain_in_teardown_order() {
        let names = ResourceNames::default();
        let orchestrator = test_orchestrator(populated_client(&names));

        let discovered = orchestrator.discover(&names).await.unwrap();

        let ids: Vec<_> = discovered
            .resources
            .iter()
            .map(|r| r.identifier.as_str())
            .collect();
        assert_eq!(
            ids,
            vec![
                "arn:camp",
                "arn:sol/v1",
                "arn:sol/v2",
                "arn:sol",
                "arn:job",
                "arn:ds",
                "arn:schema",
                "arn:dsg",
            ]
        );
        assert_eq!(
            discovered
                .resources
                .iter()
                .filter(|r| r.kind == ResourceKind::SolutionVersion)
                .count(),
            2
        );
        assert!(
            discovered
                .table()
                .to_string()
                .contains("arn:camp")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_listed_means_nothing_discovered() {
        let orchestrator = test_orchestrator(FakeClient::new());
        let discovered = orchestrator
            .discover(&ResourceNames::default())
            .await
            .unwrap();
        assert!(discovered.is_empty());

        // Only the two top-level listings ran
        let calls = orchestrator.client().calls();
        assert_eq!(
            calls,
            vec![
                Call::List(ResourceKind::DatasetGroup),
                Call::List(ResourceKind::Schema),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn removal_reuses_teardown_steps() {
        let names = ResourceNames::default();
        let orchestrator = test_orchestrator(populated_client(&names));
        let discovered = orchestrator.discover(&names).await.unwrap();
        let support = derived_support("123456789012-us-east-1-it-service-bucket", "TestRole");

        let report = orchestrator
            .remove_discovered(&discovered, &support, &LogObserver)
            .await;

        assert!(report.is_success(), "{:?}", report.failures);
        assert_eq!(report.count(CleanupResult::RemovedWithParent), 3);
        let calls = orchestrator.client().calls();
        assert!(calls.contains(&Call::DeleteBucketPolicy));
        assert!(calls.contains(&Call::DeleteBucket));
        assert!(calls.contains(&Call::DeleteRole));
        assert!(!calls.contains(&Call::Delete(ResourceKind::ImportJob)));
    }
}
