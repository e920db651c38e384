//! Persisted run state
//!
//! One JSON file per run records the identifiers a provisioning run produced,
//! so a later invocation can resume or tear the chain down.

mod cli;
mod store;
mod types;

pub use cli::{print_status, status_table};
pub use store::StateStore;
pub use types::{
    ManagedResource, PendingResource, ResourceNames, RunSettings, RunState, SupportResources,
};
