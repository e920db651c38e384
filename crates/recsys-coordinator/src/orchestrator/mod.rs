//! Lifecycle orchestration for the recommendation resource chain
//!
//! [`LifecycleOrchestrator`] drives the ordered creation pipeline
//! ([`provision`]), the reverse-order teardown ([`teardown`]) and list-based
//! discovery of leftovers ([`discovery`]). Every provider call goes through
//! the [`RetryPolicy`] and every wait through the shared poller.

pub mod discovery;
pub mod error;
pub mod progress;
pub mod provision;
pub mod teardown;

// Re-export core types
pub use discovery::{Discovered, derived_support};
pub use error::{LifecycleError, Target, TeardownError};
pub use progress::{CheckpointObserver, LogObserver, RunObserver};
pub use provision::{ProvisionReport, ProvisionRequest};
pub use teardown::{TeardownOutcome, TeardownReport};

use crate::aws::ResourceClient;
use crate::retry::{Operation, RetryPolicy};
use crate::wait::{PollConfig, PollError, wait_until_terminal};
use recsys_common::defaults::{
    CAMPAIGN_TIMEOUT, DATASET_GROUP_TIMEOUT, IMPORT_JOB_TIMEOUT, LONG_POLL_INTERVAL,
    REMOVAL_TIMEOUT, ROLE_SETTLE_DELAY, SHORT_POLL_INTERVAL, SHORT_STAGE_TIMEOUT,
    SOLUTION_VERSION_TIMEOUT,
};
use recsys_common::{ResourceKind, ResourceStatus};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Poll cadence and ceiling for each stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTimeouts {
    pub dataset_group: PollConfig,
    pub dataset: PollConfig,
    pub import_job: PollConfig,
    pub solution: PollConfig,
    pub solution_version: PollConfig,
    pub campaign: PollConfig,
    /// Waiting for a deleted resource to disappear
    pub removal: PollConfig,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            dataset_group: PollConfig::new(LONG_POLL_INTERVAL, DATASET_GROUP_TIMEOUT),
            dataset: PollConfig::new(SHORT_POLL_INTERVAL, SHORT_STAGE_TIMEOUT),
            import_job: PollConfig::new(LONG_POLL_INTERVAL, IMPORT_JOB_TIMEOUT),
            solution: PollConfig::new(SHORT_POLL_INTERVAL, SHORT_STAGE_TIMEOUT),
            solution_version: PollConfig::new(LONG_POLL_INTERVAL, SOLUTION_VERSION_TIMEOUT),
            campaign: PollConfig::new(LONG_POLL_INTERVAL, CAMPAIGN_TIMEOUT),
            removal: PollConfig::new(SHORT_POLL_INTERVAL, REMOVAL_TIMEOUT),
        }
    }
}

impl StageTimeouts {
    /// Creation wait for a kind; schemas are ready once created
    pub fn for_kind(&self, kind: ResourceKind) -> Option<PollConfig> {
        match kind {
            ResourceKind::DatasetGroup => Some(self.dataset_group),
            ResourceKind::Schema => None,
            ResourceKind::Dataset => Some(self.dataset),
            ResourceKind::ImportJob => Some(self.import_job),
            ResourceKind::Solution => Some(self.solution),
            ResourceKind::SolutionVersion => Some(self.solution_version),
            ResourceKind::Campaign => Some(self.campaign),
        }
    }
}

/// Drives one run's resource chain against a [`ResourceClient`].
///
/// Owns its client, retry policy and cancellation token; nothing is shared
/// between runs.
pub struct LifecycleOrchestrator<C> {
    client: C,
    retry: RetryPolicy,
    timeouts: StageTimeouts,
    role_settle_delay: Duration,
    cancel: CancellationToken,
}

impl<C: ResourceClient> LifecycleOrchestrator<C> {
    pub fn new(client: C, cancel: CancellationToken) -> Self {
        Self {
            client,
            retry: RetryPolicy::default(),
            timeouts: StageTimeouts::default(),
            role_settle_delay: ROLE_SETTLE_DELAY,
            cancel,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeouts(mut self, timeouts: StageTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Time given to a new access role to propagate before it is used
    pub fn with_role_settle_delay(mut self, delay: Duration) -> Self {
        self.role_settle_delay = delay;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Describe through the retry policy.
    ///
    /// For removal waits a not-found answer becomes `Absent`; otherwise it
    /// surfaces as an error the poller maps to `Absent` as well. Retry
    /// backoff here counts against the stage ceiling: the poller abandons a
    /// describe still retrying when the ceiling elapses.
    async fn describe(
        &self,
        kind: ResourceKind,
        identifier: &str,
        operation: Operation,
    ) -> anyhow::Result<ResourceStatus> {
        let attempted = self
            .retry
            .run(operation, kind.as_str(), &self.cancel, || {
                self.client.describe(kind, identifier)
            })
            .await?;
        Ok(attempted.into_value().unwrap_or(ResourceStatus::Absent))
    }

    /// Poll a resource until it reaches one of `terminal`
    async fn await_status(
        &self,
        kind: ResourceKind,
        identifier: &str,
        terminal: &[ResourceStatus],
        config: &PollConfig,
        operation: Operation,
    ) -> Result<ResourceStatus, PollError> {
        wait_until_terminal(
            || self.describe(kind, identifier, operation),
            terminal,
            config,
            &self.cancel,
            kind.as_str(),
        )
        .await
    }
}
