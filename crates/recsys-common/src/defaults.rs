//! Default configuration values shared by the coordinator and its tests
//!
//! These constants keep names, ceilings and thresholds consistent across the
//! CLI, the orchestrator and the integration tests.

use std::time::Duration;

/// Default dataset group name
pub const DEFAULT_DATASET_GROUP_NAME: &str = "it-service-recommendations";

/// Default interaction schema name
pub const DEFAULT_SCHEMA_NAME: &str = "it-service-schema";

/// Default interactions dataset name
pub const DEFAULT_DATASET_NAME: &str = "it-service-interactions";

/// Default dataset import job name
pub const DEFAULT_IMPORT_JOB_NAME: &str = "it-service-import-job";

/// Default solution name
pub const DEFAULT_SOLUTION_NAME: &str = "it-service-solution";

/// Default campaign name
pub const DEFAULT_CAMPAIGN_NAME: &str = "it-service-demo-camp";

/// Default recipe for the solution
pub const DEFAULT_RECIPE_ARN: &str = "arn:aws:personalize:::recipe/aws-user-personalization";

/// Suffix of the training data bucket; the full name is `{account}-{region}-{suffix}`
pub const DEFAULT_BUCKET_SUFFIX: &str = "it-service-bucket";

/// Default access role assumed by the service to read the bucket
pub const DEFAULT_ROLE_NAME: &str = "PersonalizeITServiceRole";

/// Object key of the uploaded interaction file
pub const DEFAULT_DATA_KEY: &str = "interactions.csv";

/// Default AWS region
pub const DEFAULT_REGION: &str = "us-east-1";

/// Dataset type of the interactions dataset
pub const INTERACTIONS_DATASET_TYPE: &str = "INTERACTIONS";

// Per-stage ceilings

/// Dataset group activation ceiling (5 hours)
pub const DATASET_GROUP_TIMEOUT: Duration = Duration::from_secs(5 * 60 * 60);

/// Dataset and solution activation ceiling (30 minutes)
pub const SHORT_STAGE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Import job ceiling (6 hours)
pub const IMPORT_JOB_TIMEOUT: Duration = Duration::from_secs(6 * 60 * 60);

/// Solution version training ceiling (3 hours)
pub const SOLUTION_VERSION_TIMEOUT: Duration = Duration::from_secs(3 * 60 * 60);

/// Campaign deployment ceiling (3 hours)
pub const CAMPAIGN_TIMEOUT: Duration = Duration::from_secs(3 * 60 * 60);

/// Delete-wait ceiling per resource (1 hour)
pub const REMOVAL_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Interval between describe calls for long stages
pub const LONG_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Interval between describe calls for short stages and delete-waits
pub const SHORT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Time given to the access role to propagate before the import job uses it
pub const ROLE_SETTLE_DELAY: Duration = Duration::from_secs(60);

// Retry policy

/// Maximum attempts (including the first) for a retried call
pub const DEFAULT_MAX_ATTEMPTS: u32 = 8;

/// Base delay before retrying a call rejected with resource-in-use
pub const IN_USE_BASE_DELAY: Duration = Duration::from_secs(15);

/// Base delay before retrying a throttled call
pub const THROTTLE_BASE_DELAY: Duration = Duration::from_secs(1);

/// Cap for exponential retry delays
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(120);

// Training data thresholds

/// Minimum interaction rows accepted by the provider
pub const MIN_INTERACTIONS: usize = 1000;

/// Minimum distinct users accepted by the provider
pub const MIN_DISTINCT_USERS: usize = 25;

/// Minimum distinct items for a meaningful ranking
pub const MIN_DISTINCT_ITEMS: usize = 2;
