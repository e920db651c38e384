//! recsys-common - Shared types and defaults
//!
//! This crate provides the resource vocabulary used by the coordinator and
//! its tests, without any AWS SDK dependencies to keep it lightweight.
//!
//! ## Modules
//!
//! - [`defaults`]: Default names, ceilings, retry and validation settings
//! - [`resource_kind`]: Managed resource kinds and lifecycle ordering
//! - [`status`]: Canonical resource status

pub mod defaults;
pub mod resource_kind;
pub mod status;

// Re-export commonly used types
pub use resource_kind::{Removal, ResourceKind};
pub use status::ResourceStatus;
