//! Managed resource kinds and their lifecycle ordering
//!
//! The declaration order of [`ResourceKind`] is the creation order: every
//! kind depends on at least one kind declared before it. Teardown walks the
//! same list in reverse.

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

/// Kinds of recommendation-service resources driven by the orchestrator
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ResourceKind {
    /// Top-level container scoping the pipeline
    DatasetGroup,
    /// Interaction schema
    Schema,
    /// Interactions dataset (references schema + group)
    Dataset,
    /// Asynchronous load of training data into the dataset
    ImportJob,
    /// Trainable model configuration
    Solution,
    /// One trained instance of a solution
    SolutionVersion,
    /// Deployed serving endpoint for a solution version
    Campaign,
}

/// How a kind leaves the provider during teardown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// The provider exposes a delete call for this kind
    Delete,
    /// No delete call; the resource disappears when its parent is deleted
    WithParent(ResourceKind),
}

impl ResourceKind {
    /// All kinds in creation order
    pub fn creation_order() -> impl Iterator<Item = ResourceKind> {
        ResourceKind::iter()
    }

    /// All kinds in teardown order (reverse of creation)
    pub fn teardown_order() -> impl Iterator<Item = ResourceKind> {
        ResourceKind::iter().rev()
    }

    pub fn as_str(&self) -> &str {
        self.as_ref()
    }

    pub fn removal(self) -> Removal {
        match self {
            ResourceKind::ImportJob => Removal::WithParent(ResourceKind::Dataset),
            ResourceKind::SolutionVersion => Removal::WithParent(ResourceKind::Solution),
            _ => Removal::Delete,
        }
    }

    /// Whether the provider reports a lifecycle status for this kind.
    ///
    /// Schemas are ready as soon as the create call returns.
    pub fn has_lifecycle_status(self) -> bool {
        !matches!(self, ResourceKind::Schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creation_order_matches_dependencies() {
        let order: Vec<_> = ResourceKind::creation_order().collect();
        assert_eq!(
            order,
            vec![
                ResourceKind::DatasetGroup,
                ResourceKind::Schema,
                ResourceKind::Dataset,
                ResourceKind::ImportJob,
                ResourceKind::Solution,
                ResourceKind::SolutionVersion,
                ResourceKind::Campaign,
            ]
        );
    }

    #[test]
    fn teardown_is_strictly_descending() {
        let order: Vec<_> = ResourceKind::teardown_order().collect();
        assert_eq!(order.first(), Some(&ResourceKind::Campaign));
        assert_eq!(order.last(), Some(&ResourceKind::DatasetGroup));
        assert!(order.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn parents_are_removed_after_children() {
        for kind in ResourceKind::creation_order() {
            if let Removal::WithParent(parent) = kind.removal() {
                assert!(parent < kind, "{kind} must be torn down before {parent}");
            }
        }
    }

    #[test]
    fn parse_round_trips_display() {
        for kind in ResourceKind::creation_order() {
            assert_eq!(kind.to_string().parse::<ResourceKind>().ok(), Some(kind));
        }
        assert_eq!(
            "SOLUTION_VERSION".parse::<ResourceKind>().ok(),
            Some(ResourceKind::SolutionVersion)
        );
        assert!("bucket".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&ResourceKind::ImportJob).unwrap();
        assert_eq!(json, "\"import_job\"");
    }
}
