//! The capability boundary between the orchestrator and the cloud provider
//!
//! [`ResourceClient`] is everything the lifecycle pipelines need from the
//! outside world. [`AwsResourceClient`] implements it on top of the
//! Personalize, S3 and IAM wrappers; tests substitute a mock or a scripted
//! fake.

use crate::aws::context::AwsContext;
use crate::aws::iam::{AccessRole, IamClient};
use crate::aws::personalize::PersonalizeClient;
use crate::aws::s3::S3Client;
use anyhow::Result;
use recsys_common::{ResourceKind, ResourceStatus};
use std::collections::BTreeMap;
use std::path::Path;

/// Parameters of a create call, one variant per resource kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateRequest {
    DatasetGroup {
        name: String,
    },
    Schema {
        name: String,
        definition: String,
    },
    Dataset {
        name: String,
        dataset_group_arn: String,
        schema_arn: String,
    },
    ImportJob {
        name: String,
        dataset_arn: String,
        data_location: String,
        role_arn: String,
    },
    Solution {
        name: String,
        dataset_group_arn: String,
        recipe_arn: String,
    },
    SolutionVersion {
        solution_arn: String,
    },
    Campaign {
        name: String,
        solution_version_arn: String,
        min_provisioned_tps: i32,
    },
}

impl CreateRequest {
    /// Kind of resource this request creates
    pub fn kind(&self) -> ResourceKind {
        match self {
            CreateRequest::DatasetGroup { .. } => ResourceKind::DatasetGroup,
            CreateRequest::Schema { .. } => ResourceKind::Schema,
            CreateRequest::Dataset { .. } => ResourceKind::Dataset,
            CreateRequest::ImportJob { .. } => ResourceKind::ImportJob,
            CreateRequest::Solution { .. } => ResourceKind::Solution,
            CreateRequest::SolutionVersion { .. } => ResourceKind::SolutionVersion,
            CreateRequest::Campaign { .. } => ResourceKind::Campaign,
        }
    }
}

/// One entry of a list call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSummary {
    pub kind: ResourceKind,
    pub name: Option<String>,
    pub identifier: String,
    pub status: ResourceStatus,
}

impl ResourceSummary {
    /// Build a summary from SDK getters, skipping entries without an ARN
    pub(crate) fn from_parts(
        kind: ResourceKind,
        name: Option<&str>,
        identifier: Option<&str>,
        status: ResourceStatus,
    ) -> Option<Self> {
        Some(Self {
            kind,
            name: name.map(str::to_string),
            identifier: identifier?.to_string(),
            status,
        })
    }
}

/// Provider operations used by the lifecycle pipelines.
///
/// Every error returned here carries a classified
/// [`ServiceError`](crate::aws::error::ServiceError) when the provider
/// reported one; the retry policy depends on it.
///
/// Note: `list` takes `Option<String>` instead of `Option<&str>` to work
/// around mockall lifetime limitations.
#[allow(async_fn_in_trait)] // Internal use only, Send+Sync bounds on trait are sufficient
#[cfg_attr(test, mockall::automock)]
pub trait ResourceClient: Send + Sync {
    /// Issue a create call, returning the new resource's identifier
    async fn create(&self, request: CreateRequest) -> Result<String>;

    /// Current provider status of a resource
    async fn describe(&self, kind: ResourceKind, identifier: &str) -> Result<ResourceStatus>;

    /// Issue a delete call
    async fn delete(&self, kind: ResourceKind, identifier: &str) -> Result<()>;

    /// List resources of a kind, optionally scoped to a parent identifier
    async fn list(
        &self,
        kind: ResourceKind,
        parent: Option<String>,
    ) -> Result<Vec<ResourceSummary>>;

    /// Offline evaluation metrics of a trained solution version
    async fn solution_metrics(&self, solution_version: &str) -> Result<BTreeMap<String, f64>>;

    /// Create the training data bucket (an owned bucket is reused)
    async fn create_bucket(&self, bucket: &str) -> Result<()>;

    /// Upload the training data file, returning its storage location
    async fn upload_training_data(&self, bucket: &str, key: &str, path: &Path) -> Result<String>;

    /// Grant the service read access to the bucket
    async fn put_bucket_policy(&self, bucket: &str) -> Result<()>;

    /// Create (or adopt an existing) access role
    async fn create_access_role(&self, role_name: &str) -> Result<AccessRole>;

    /// Remove the bucket policy
    async fn delete_bucket_policy(&self, bucket: &str) -> Result<()>;

    /// Empty and delete the bucket
    async fn delete_bucket(&self, bucket: &str) -> Result<()>;

    /// Detach the role's policies and delete it
    async fn delete_access_role(&self, role_name: &str) -> Result<()>;
}

/// [`ResourceClient`] backed by the AWS SDK
pub struct AwsResourceClient {
    personalize: PersonalizeClient,
    s3: S3Client,
    iam: IamClient,
}

impl AwsResourceClient {
    /// Create all service clients from a pre-loaded AWS context
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            personalize: PersonalizeClient::from_context(ctx),
            s3: S3Client::from_context(ctx),
            iam: IamClient::from_context(ctx),
        }
    }
}

impl ResourceClient for AwsResourceClient {
    async fn create(&self, request: CreateRequest) -> Result<String> {
        self.personalize.create(request).await
    }

    async fn describe(&self, kind: ResourceKind, identifier: &str) -> Result<ResourceStatus> {
        self.personalize.describe(kind, identifier).await
    }

    async fn delete(&self, kind: ResourceKind, identifier: &str) -> Result<()> {
        self.personalize.delete(kind, identifier).await
    }

    async fn list(
        &self,
        kind: ResourceKind,
        parent: Option<String>,
    ) -> Result<Vec<ResourceSummary>> {
        self.personalize.list(kind, parent.as_deref()).await
    }

    async fn solution_metrics(&self, solution_version: &str) -> Result<BTreeMap<String, f64>> {
        self.personalize.solution_metrics(solution_version).await
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        self.s3.create_bucket(bucket).await
    }

    async fn upload_training_data(&self, bucket: &str, key: &str, path: &Path) -> Result<String> {
        self.s3.upload_file(bucket, key, path).await
    }

    async fn put_bucket_policy(&self, bucket: &str) -> Result<()> {
        self.s3.put_bucket_policy(bucket).await
    }

    async fn create_access_role(&self, role_name: &str) -> Result<AccessRole> {
        self.iam.create_access_role(role_name).await
    }

    async fn delete_bucket_policy(&self, bucket: &str) -> Result<()> {
        self.s3.delete_bucket_policy(bucket).await
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        self.s3.delete_bucket(bucket).await
    }

    async fn delete_access_role(&self, role_name: &str) -> Result<()> {
        self.iam.delete_access_role(role_name).await
    }
}
