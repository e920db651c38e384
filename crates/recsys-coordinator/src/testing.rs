//! Scripted in-memory [`ResourceClient`] for pipeline tests
//!
//! Every call is logged. Statuses are scripted per kind (the last scripted
//! status repeats, default Active), deleted resources answer not-found, and
//! errors can be queued per call.

use crate::aws::{AccessRole, CreateRequest, ResourceClient, ResourceSummary, ServiceError};
use crate::dataset::ValidationThresholds;
use crate::orchestrator::{LifecycleOrchestrator, ProvisionRequest, StageTimeouts};
use crate::retry::RetryPolicy;
use crate::wait::PollConfig;
use recsys_common::{ResourceKind, ResourceStatus};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;

/// A recorded provider call
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum Call {
    Create(ResourceKind),
    Describe(ResourceKind),
    Delete(ResourceKind),
    List(ResourceKind),
    Metrics,
    CreateBucket,
    Upload,
    PutBucketPolicy,
    CreateRole,
    DeleteBucketPolicy,
    DeleteBucket,
    DeleteRole,
}

impl Call {
    /// Resource kind the call acts on, if any
    pub(crate) fn kind(&self) -> Option<ResourceKind> {
        match self {
            Call::Create(kind) | Call::Describe(kind) | Call::Delete(kind) | Call::List(kind) => {
                Some(*kind)
            }
            _ => None,
        }
    }
}

#[derive(Default)]
struct Inner {
    calls: Vec<Call>,
    next_id: u32,
    statuses: HashMap<ResourceKind, VecDeque<ResourceStatus>>,
    vanished: HashSet<ResourceKind>,
    create_errors: HashMap<ResourceKind, VecDeque<ServiceError>>,
    delete_errors: HashMap<ResourceKind, VecDeque<ServiceError>>,
    after_delete: HashMap<ResourceKind, ResourceStatus>,
    lingering: HashMap<ResourceKind, u32>,
    support_errors: HashMap<Call, ServiceError>,
    removed: HashSet<String>,
    deleted: HashMap<String, ResourceKind>,
    listings: HashMap<(ResourceKind, Option<String>), Vec<ResourceSummary>>,
    metrics_unavailable: bool,
    role_exists: bool,
}

#[derive(Default)]
pub(crate) struct FakeClient {
    inner: Mutex<Inner>,
}

impl FakeClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Statuses `describe` returns for a kind, in order; the last repeats
    pub(crate) fn script(&self, kind: ResourceKind, statuses: &[ResourceStatus]) {
        self.lock()
            .statuses
            .insert(kind, statuses.iter().copied().collect());
    }

    /// Make `describe` answer not-found for a kind
    pub(crate) fn vanish(&self, kind: ResourceKind) {
        self.lock().vanished.insert(kind);
    }

    pub(crate) fn fail_create(&self, kind: ResourceKind, error: ServiceError) {
        self.lock()
            .create_errors
            .entry(kind)
            .or_default()
            .push_back(error);
    }

    /// Throttle the first `times` create calls of a kind
    pub(crate) fn throttle_create(&self, kind: ResourceKind, times: usize) {
        let mut inner = self.lock();
        let queue = inner.create_errors.entry(kind).or_default();
        for _ in 0..times {
            queue.push_back(ServiceError::Throttled {
                message: "Rate exceeded".to_string(),
            });
        }
    }

    /// Errors returned by successive delete calls of a kind
    pub(crate) fn fail_delete(&self, kind: ResourceKind, errors: Vec<ServiceError>) {
        self.lock()
            .delete_errors
            .entry(kind)
            .or_default()
            .extend(errors);
    }

    /// Keep a deleted resource around, reporting `status` afterwards
    pub(crate) fn keep_after_delete(&self, kind: ResourceKind, status: ResourceStatus) {
        self.lock().after_delete.insert(kind, status);
    }

    /// Answer `describes` more describe calls with the scripted status after
    /// a delete, then not-found
    pub(crate) fn linger_after_delete(&self, kind: ResourceKind, describes: u32) {
        self.lock().lingering.insert(kind, describes);
    }

    /// The access role already exists before the run
    pub(crate) fn preexisting_role(&self) {
        self.lock().role_exists = true;
    }

    /// Fail every call of a supporting operation
    pub(crate) fn fail_support(&self, call: Call, error: ServiceError) {
        self.lock().support_errors.insert(call, error);
    }

    pub(crate) fn with_listing(
        &self,
        kind: ResourceKind,
        parent: Option<&str>,
        summaries: Vec<ResourceSummary>,
    ) {
        self.lock()
            .listings
            .insert((kind, parent.map(str::to_string)), summaries);
    }

    pub(crate) fn fail_metrics(&self) {
        self.lock().metrics_unavailable = true;
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    fn support_call(&self, call: Call) -> anyhow::Result<()> {
        let mut inner = self.lock();
        inner.calls.push(call.clone());
        match inner.support_errors.get(&call) {
            Some(error) => Err(error.clone().into()),
            None => Ok(()),
        }
    }
}

impl ResourceClient for FakeClient {
    async fn create(&self, request: CreateRequest) -> anyhow::Result<String> {
        let kind = request.kind();
        let mut inner = self.lock();
        inner.calls.push(Call::Create(kind));
        if let Some(error) = inner.create_errors.get_mut(&kind).and_then(VecDeque::pop_front) {
            return Err(error.into());
        }
        inner.next_id += 1;
        Ok(format!("arn:aws:personalize:{kind}:{}", inner.next_id))
    }

    async fn describe(&self, kind: ResourceKind, identifier: &str) -> anyhow::Result<ResourceStatus> {
        let mut inner = self.lock();
        inner.calls.push(Call::Describe(kind));

        if inner.removed.contains(identifier) || inner.vanished.contains(&kind) {
            return Err(ServiceError::NotFound {
                message: format!("{identifier} does not exist"),
            }
            .into());
        }
        if inner.deleted.contains_key(identifier) {
            if let Some(status) = inner.after_delete.get(&kind) {
                return Ok(*status);
            }
            match inner.lingering.get_mut(&kind) {
                Some(left) if *left > 0 => *left -= 1,
                _ => {
                    return Err(ServiceError::NotFound {
                        message: format!("{identifier} does not exist"),
                    }
                    .into());
                }
            }
        }

        let status = match inner.statuses.get_mut(&kind) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().copied(),
            None => None,
        };
        Ok(status.unwrap_or(ResourceStatus::Active))
    }

    async fn delete(&self, kind: ResourceKind, identifier: &str) -> anyhow::Result<()> {
        let mut inner = self.lock();
        inner.calls.push(Call::Delete(kind));
        if let Some(error) = inner.delete_errors.get_mut(&kind).and_then(VecDeque::pop_front) {
            return Err(error.into());
        }
        if inner.after_delete.contains_key(&kind) || inner.lingering.contains_key(&kind) {
            inner.deleted.insert(identifier.to_string(), kind);
        } else {
            inner.removed.insert(identifier.to_string());
        }
        Ok(())
    }

    async fn list(
        &self,
        kind: ResourceKind,
        parent: Option<String>,
    ) -> anyhow::Result<Vec<ResourceSummary>> {
        let mut inner = self.lock();
        inner.calls.push(Call::List(kind));
        Ok(inner
            .listings
            .get(&(kind, parent))
            .cloned()
            .unwrap_or_default())
    }

    async fn solution_metrics(&self, _solution_version: &str) -> anyhow::Result<BTreeMap<String, f64>> {
        let mut inner = self.lock();
        inner.calls.push(Call::Metrics);
        if inner.metrics_unavailable {
            return Err(ServiceError::Sdk {
                code: Some("InvalidInputException".to_string()),
                message: "metrics not ready".to_string(),
            }
            .into());
        }
        Ok(BTreeMap::from([
            ("coverage".to_string(), 0.5),
            ("precision_at_25".to_string(), 0.04),
        ]))
    }

    async fn create_bucket(&self, _bucket: &str) -> anyhow::Result<()> {
        self.support_call(Call::CreateBucket)
    }

    async fn upload_training_data(
        &self,
        bucket: &str,
        key: &str,
        _path: &Path,
    ) -> anyhow::Result<String> {
        self.support_call(Call::Upload)?;
        Ok(format!("s3://{bucket}/{key}"))
    }

    async fn put_bucket_policy(&self, _bucket: &str) -> anyhow::Result<()> {
        self.support_call(Call::PutBucketPolicy)
    }

    async fn create_access_role(&self, role_name: &str) -> anyhow::Result<AccessRole> {
        self.support_call(Call::CreateRole)?;
        Ok(AccessRole {
            arn: format!("arn:aws:iam::123456789012:role/{role_name}"),
            created: !self.lock().role_exists,
        })
    }

    async fn delete_bucket_policy(&self, _bucket: &str) -> anyhow::Result<()> {
        self.support_call(Call::DeleteBucketPolicy)
    }

    async fn delete_bucket(&self, _bucket: &str) -> anyhow::Result<()> {
        self.support_call(Call::DeleteBucket)
    }

    async fn delete_access_role(&self, _role_name: &str) -> anyhow::Result<()> {
        self.support_call(Call::DeleteRole)
    }
}

/// Short ceilings and deterministic backoff for paused-clock tests
pub(crate) fn test_timeouts() -> StageTimeouts {
    let short = PollConfig::new(Duration::from_secs(1), Duration::from_secs(30));
    let long = PollConfig::new(Duration::from_secs(5), Duration::from_secs(120));
    StageTimeouts {
        dataset_group: short,
        dataset: short,
        import_job: long,
        solution: short,
        solution_version: long,
        campaign: long,
        removal: short,
    }
}

pub(crate) fn test_orchestrator(client: FakeClient) -> LifecycleOrchestrator<FakeClient> {
    LifecycleOrchestrator::new(client, CancellationToken::new())
        .with_retry(RetryPolicy {
            max_attempts: 5,
            in_use_delay: Duration::from_secs(1),
            throttle_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            jitter: false,
        })
        .with_timeouts(test_timeouts())
        .with_role_settle_delay(Duration::ZERO)
}

/// A request over a valid interaction file; keep the file alive for the test
pub(crate) fn provision_request() -> (NamedTempFile, ProvisionRequest) {
    let file = recsys_test_utils::valid_interactions_file();
    let request = ProvisionRequest {
        data_path: file.path().to_path_buf(),
        thresholds: ValidationThresholds::default(),
        bucket: "test-bucket".to_string(),
    };
    (file, request)
}
