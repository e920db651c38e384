//! Shared cleanup outcomes

use serde::Serialize;

/// Result of a single resource cleanup operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CleanupResult {
    /// Resource was successfully deleted
    Deleted,
    /// Resource was already deleted (not found)
    AlreadyDeleted,
    /// Resource has no delete call and goes away with its parent
    RemovedWithParent,
    /// Resource predates the run and was left in place
    Retained,
    /// Cleanup failed with error
    Failed,
    /// Resource was skipped (dry run or cancelled)
    Skipped,
}

impl CleanupResult {
    /// Whether the resource is gone (or will be, with its parent)
    pub fn is_success(self) -> bool {
        matches!(
            self,
            CleanupResult::Deleted
                | CleanupResult::AlreadyDeleted
                | CleanupResult::RemovedWithParent
                | CleanupResult::Retained
        )
    }
}
