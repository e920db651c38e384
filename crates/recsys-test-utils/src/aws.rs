//! AWS test utilities
//!
//! Provides region detection and unique run ID generation for AWS integration tests.

use chrono::Utc;

/// Get the AWS region for tests.
///
/// Checks environment variables in order:
/// 1. AWS_REGION
/// 2. AWS_DEFAULT_REGION
/// 3. Falls back to us-east-1
///
/// # Example
///
/// ```
/// use recsys_test_utils::aws::get_test_region;
///
/// let region = get_test_region();
/// assert!(!region.is_empty());
/// ```
pub fn get_test_region() -> String {
    std::env::var("AWS_REGION")
        .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
        .unwrap_or_else(|_| "us-east-1".to_string())
}

/// Generate a unique run ID for test resources.
///
/// Format: `test-{timestamp_ms}-{counter}`. The counter keeps names unique
/// even when tests start in the same millisecond.
///
/// # Example
///
/// ```
/// use recsys_test_utils::aws::test_run_id;
///
/// let run_id = test_run_id();
/// assert!(run_id.starts_with("test-"));
/// ```
pub fn test_run_id() -> String {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let ts = Utc::now().timestamp_millis();
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("test-{}-{}", ts, counter)
}

/// Generate a unique resource name prefix for test resources.
///
/// # Example
///
/// ```
/// use recsys_test_utils::aws::test_resource_name;
///
/// let name = test_resource_name("group");
/// assert!(name.starts_with("recsys-group-test-"));
/// ```
pub fn test_resource_name(kind: &str) -> String {
    format!("recsys-{}-{}", kind, test_run_id())
}
