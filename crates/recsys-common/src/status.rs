//! Canonical resource status
//!
//! Provides a shared `ResourceStatus` enum that collapses the provider's
//! free-form status strings into the handful of states the orchestrator
//! reasons about.

use serde::{Deserialize, Serialize};

/// Provider-reported lifecycle status of a managed resource
///
/// `Absent` never comes from the provider directly: it is the local sentinel
/// for "describe returned not-found".
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum ResourceStatus {
    /// Accepted by the provider, work not started
    #[default]
    #[strum(serialize = "pending")]
    Pending,
    /// Creating, deleting or updating
    #[strum(serialize = "in_progress")]
    InProgress,
    /// Ready for use
    #[strum(serialize = "active")]
    Active,
    /// The provider gave up creating the resource
    #[strum(serialize = "failed")]
    Failed,
    /// The provider gave up deleting the resource
    #[strum(serialize = "delete_failed")]
    DeleteFailed,
    /// The provider no longer knows the resource
    #[strum(serialize = "absent")]
    Absent,
}

impl ResourceStatus {
    /// Statuses a creation stage waits for
    pub const CREATION_TERMINAL: &'static [ResourceStatus] = &[
        ResourceStatus::Active,
        ResourceStatus::Failed,
        ResourceStatus::DeleteFailed,
    ];

    /// Statuses a resource must reach before it can be deleted
    pub const DELETABLE: &'static [ResourceStatus] = &[
        ResourceStatus::Active,
        ResourceStatus::Failed,
        ResourceStatus::DeleteFailed,
    ];

    /// Statuses a delete-wait finishes on.
    ///
    /// A stale `Failed` left over from creation is not among them: the wait
    /// keeps polling until the resource is gone or its deletion fails.
    pub const REMOVAL_TERMINAL: &'static [ResourceStatus] =
        &[ResourceStatus::Absent, ResourceStatus::DeleteFailed];

    /// Map a provider status string (e.g. `CREATE IN_PROGRESS`) to a status.
    ///
    /// Unknown strings map to `InProgress` so that polling keeps going until
    /// the ceiling instead of treating a new provider state as terminal.
    pub fn from_provider(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_uppercase().replace('_', " ");
        match normalized.as_str() {
            "ACTIVE" => Self::Active,
            "CREATE PENDING" => Self::Pending,
            "CREATE FAILED" | "CREATE STOPPED" => Self::Failed,
            "DELETE FAILED" => Self::DeleteFailed,
            // CREATE IN_PROGRESS, CREATE STOPPING, DELETE *, UPDATE *
            _ => Self::InProgress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_strings() {
        assert_eq!(
            ResourceStatus::from_provider("CREATE PENDING"),
            ResourceStatus::Pending
        );
        assert_eq!(
            ResourceStatus::from_provider("CREATE IN_PROGRESS"),
            ResourceStatus::InProgress
        );
        assert_eq!(
            ResourceStatus::from_provider("ACTIVE"),
            ResourceStatus::Active
        );
        assert_eq!(
            ResourceStatus::from_provider("CREATE FAILED"),
            ResourceStatus::Failed
        );
        assert_eq!(
            ResourceStatus::from_provider("CREATE STOPPED"),
            ResourceStatus::Failed
        );
        assert_eq!(
            ResourceStatus::from_provider("DELETE IN_PROGRESS"),
            ResourceStatus::InProgress
        );
        assert_eq!(
            ResourceStatus::from_provider("DELETE FAILED"),
            ResourceStatus::DeleteFailed
        );
        assert_eq!(
            ResourceStatus::from_provider("UPDATE PENDING"),
            ResourceStatus::InProgress
        );
    }

    #[test]
    fn unknown_provider_string_keeps_polling() {
        let status = ResourceStatus::from_provider("SOMETHING NEW");
        assert_eq!(status, ResourceStatus::InProgress);
        assert!(!ResourceStatus::CREATION_TERMINAL.contains(&status));
    }

    #[test]
    fn creation_failure_does_not_end_a_delete_wait() {
        assert!(!ResourceStatus::REMOVAL_TERMINAL.contains(&ResourceStatus::Failed));
        assert!(ResourceStatus::REMOVAL_TERMINAL.contains(&ResourceStatus::DeleteFailed));
        assert!(ResourceStatus::DELETABLE.contains(&ResourceStatus::Failed));
    }

    #[test]
    fn canonical_names() {
        assert_eq!(ResourceStatus::InProgress.to_string(), "in_progress");
        assert_eq!("ACTIVE".parse::<ResourceStatus>().ok(), Some(ResourceStatus::Active));
        assert!("bogus".parse::<ResourceStatus>().is_err());
    }
}
