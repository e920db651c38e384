//! Shared test utilities for recsys-lifecycle
//!
//! This crate provides common test helpers that can be used across
//! multiple test modules without circular dependencies.
//!
//! ## Modules
//!
//! - [`aws`]: AWS region detection and test run ID generation
//! - [`data`]: Interaction CSV fixtures

pub mod aws;
pub mod data;

// Re-export commonly used items
pub use aws::{get_test_region, test_resource_name, test_run_id};
pub use data::{InteractionShape, interactions_csv, valid_interactions_file, write_csv};
