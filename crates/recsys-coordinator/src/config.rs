//! Configuration types for the coordinator

use crate::dataset::ValidationThresholds;
use crate::orchestrator::StageTimeouts;
use crate::retry::RetryPolicy;
use crate::state::{ResourceNames, RunSettings};
use std::path::PathBuf;

/// AWS connection configuration
#[derive(Debug, Clone)]
pub struct AwsConfig {
    /// AWS region
    pub region: String,
    /// AWS profile name (overrides default credential resolution)
    pub aws_profile: Option<String>,
}

/// Training data and where it is staged
#[derive(Debug, Clone)]
pub struct DataConfig {
    /// Interaction CSV to validate and upload
    pub path: PathBuf,
    pub thresholds: ValidationThresholds,
    /// Bucket names are `<account>-<region>-<suffix>`
    pub bucket_suffix: String,
    /// Object key of the uploaded file
    pub key: String,
}

/// Configuration for a provisioning run
///
/// Composed of focused sub-configs; the parts that must survive the process
/// are folded into [`RunSettings`] and persisted with the run state.
#[derive(Debug, Clone)]
pub struct ProvisionConfig {
    pub names: ResourceNames,
    pub recipe_arn: String,
    pub role_name: String,
    pub aws: AwsConfig,
    pub data: DataConfig,
    pub timeouts: StageTimeouts,
    pub retry: RetryPolicy,
    /// Continue the run recorded in the state file instead of starting fresh
    pub resume: bool,
    /// State file location (default: per-user data directory)
    pub state_path: Option<PathBuf>,
}

impl ProvisionConfig {
    pub fn aws_profile(&self) -> Option<&str> {
        self.aws.aws_profile.as_deref()
    }

    /// Settings recorded in a new run state
    pub fn settings(&self) -> RunSettings {
        RunSettings {
            names: self.names.clone(),
            recipe_arn: self.recipe_arn.clone(),
            region: self.aws.region.clone(),
            bucket_suffix: self.data.bucket_suffix.clone(),
            role_name: self.role_name.clone(),
            data_key: self.data.key.clone(),
        }
    }
}
