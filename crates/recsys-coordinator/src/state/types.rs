//! Run state types

use crate::aws::AccountId;
use chrono::{DateTime, Utc};
use recsys_common::defaults::{
    DEFAULT_BUCKET_SUFFIX, DEFAULT_CAMPAIGN_NAME, DEFAULT_DATA_KEY, DEFAULT_DATASET_GROUP_NAME,
    DEFAULT_DATASET_NAME, DEFAULT_IMPORT_JOB_NAME, DEFAULT_RECIPE_ARN, DEFAULT_REGION,
    DEFAULT_ROLE_NAME, DEFAULT_SCHEMA_NAME, DEFAULT_SOLUTION_NAME,
};
use recsys_common::{ResourceKind, ResourceStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Names given to the resources a run creates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceNames {
    pub dataset_group: String,
    pub schema: String,
    pub dataset: String,
    pub import_job: String,
    pub solution: String,
    pub campaign: String,
}

impl Default for ResourceNames {
    fn default() -> Self {
        Self {
            dataset_group: DEFAULT_DATASET_GROUP_NAME.to_string(),
            schema: DEFAULT_SCHEMA_NAME.to_string(),
            dataset: DEFAULT_DATASET_NAME.to_string(),
            import_job: DEFAULT_IMPORT_JOB_NAME.to_string(),
            solution: DEFAULT_SOLUTION_NAME.to_string(),
            campaign: DEFAULT_CAMPAIGN_NAME.to_string(),
        }
    }
}

impl ResourceNames {
    /// Name of a kind; solution versions are unnamed
    pub fn name_for(&self, kind: ResourceKind) -> Option<&str> {
        match kind {
            ResourceKind::DatasetGroup => Some(&self.dataset_group),
            ResourceKind::Schema => Some(&self.schema),
            ResourceKind::Dataset => Some(&self.dataset),
            ResourceKind::ImportJob => Some(&self.import_job),
            ResourceKind::Solution => Some(&self.solution),
            ResourceKind::SolutionVersion => None,
            ResourceKind::Campaign => Some(&self.campaign),
        }
    }
}

/// Static configuration of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSettings {
    pub names: ResourceNames,
    pub recipe_arn: String,
    pub region: String,
    /// Suffix of the training data bucket name
    pub bucket_suffix: String,
    pub role_name: String,
    /// Object key of the uploaded interaction file
    pub data_key: String,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            names: ResourceNames::default(),
            recipe_arn: DEFAULT_RECIPE_ARN.to_string(),
            region: DEFAULT_REGION.to_string(),
            bucket_suffix: DEFAULT_BUCKET_SUFFIX.to_string(),
            role_name: DEFAULT_ROLE_NAME.to_string(),
            data_key: DEFAULT_DATA_KEY.to_string(),
        }
    }
}

impl RunSettings {
    /// Training data bucket of this run in the given account
    pub fn bucket_name(&self, account: &AccountId) -> String {
        account.bucket_name(&self.region, &self.bucket_suffix)
    }
}

/// Storage and access resources backing the import job.
///
/// Each field is set once the call creating it has succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportResources {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_location: Option<String>,
    #[serde(default)]
    pub bucket_policy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_arn: Option<String>,
    /// The role existed before this run; teardown leaves it in place
    #[serde(default)]
    pub role_adopted: bool,
}

impl SupportResources {
    pub fn is_empty(&self) -> bool {
        self.bucket.is_none() && !self.bucket_policy && self.role_name.is_none()
    }
}

/// A created resource whose stage has not been confirmed yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingResource {
    pub kind: ResourceKind,
    pub identifier: String,
}

/// A resource handle together with its last known status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManagedResource {
    pub kind: ResourceKind,
    pub identifier: String,
    pub status: ResourceStatus,
}

/// Identifiers produced by one run, plus the settings they were created with.
///
/// A kind's identifier is recorded once its stage is confirmed (the resource
/// reached Active, or the schema create call returned). Between the create
/// call and confirmation the handle sits in the single `pending` slot, so a
/// failed or interrupted stage can still be torn down or resumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub settings: RunSettings,
    #[serde(default)]
    resources: BTreeMap<ResourceKind, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pending: Option<PendingResource>,
    #[serde(default)]
    pub support: SupportResources,
}

impl RunState {
    pub fn new(settings: RunSettings) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::now_v7(),
            created_at: now,
            updated_at: now,
            settings,
            resources: BTreeMap::new(),
            pending: None,
            support: SupportResources::default(),
        }
    }

    /// Confirmed identifier of a kind
    pub fn identifier(&self, kind: ResourceKind) -> Option<&str> {
        self.resources.get(&kind).map(String::as_str)
    }

    /// All confirmed identifiers in creation order
    pub fn identifiers(&self) -> &BTreeMap<ResourceKind, String> {
        &self.resources
    }

    pub fn pending(&self) -> Option<&PendingResource> {
        self.pending.as_ref()
    }

    /// Confirmed identifier of a kind, or its pending handle
    pub fn handle(&self, kind: ResourceKind) -> Option<&str> {
        self.identifier(kind).or_else(|| {
            self.pending
                .as_ref()
                .filter(|p| p.kind == kind)
                .map(|p| p.identifier.as_str())
        })
    }

    /// Record the handle returned by a create call.
    ///
    /// Empty identifiers are ignored: an empty handle means never created.
    pub fn set_pending(&mut self, kind: ResourceKind, identifier: impl Into<String>) {
        let identifier = identifier.into();
        if identifier.is_empty() {
            return;
        }
        self.pending = Some(PendingResource { kind, identifier });
        self.touch();
    }

    /// Move a kind's pending handle into the confirmed mapping
    pub fn confirm(&mut self, kind: ResourceKind) -> bool {
        match self.pending.take() {
            Some(p) if p.kind == kind => {
                self.resources.insert(kind, p.identifier);
                self.touch();
                true
            }
            other => {
                self.pending = other;
                false
            }
        }
    }

    /// Record a confirmed identifier directly.
    ///
    /// Empty identifiers are ignored.
    pub fn record(&mut self, kind: ResourceKind, identifier: impl Into<String>) {
        let identifier = identifier.into();
        if identifier.is_empty() {
            return;
        }
        if self.pending.as_ref().is_some_and(|p| p.kind == kind) {
            self.pending = None;
        }
        self.resources.insert(kind, identifier);
        self.touch();
    }

    /// Forget a kind (confirmed and pending)
    pub fn clear(&mut self, kind: ResourceKind) {
        let removed = self.resources.remove(&kind).is_some();
        let was_pending = self.pending.as_ref().is_some_and(|p| p.kind == kind);
        if was_pending {
            self.pending = None;
        }
        if removed || was_pending {
            self.touch();
        }
    }

    /// Every handle teardown must visit, in teardown order
    pub fn teardown_targets(&self) -> Vec<ManagedResource> {
        ResourceKind::teardown_order()
            .filter_map(|kind| {
                self.handle(kind).map(|identifier| ManagedResource {
                    kind,
                    identifier: identifier.to_string(),
                    status: ResourceStatus::Pending,
                })
            })
            .collect()
    }

    /// Whether nothing is left to tear down
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty() && self.pending.is_none() && self.support.is_empty()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
