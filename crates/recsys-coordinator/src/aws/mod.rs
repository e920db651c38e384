//! AWS client modules for the coordinator
//!
//! This module provides wrappers around AWS SDK clients for:
//! - Personalize: the managed resource chain
//! - IAM: the access role the service assumes
//! - S3: training data storage
//! - STS: Account ID lookup
//! - client: the `ResourceClient` capability the orchestrator drives

pub mod account;
pub mod cleanup;
pub mod client;
pub mod context;
pub mod error;
pub mod iam;
pub mod personalize;
pub mod s3;

// Core clients
pub use account::{AccountId, get_current_account_id};
pub use client::{AwsResourceClient, CreateRequest, ResourceClient, ResourceSummary};
pub use context::AwsContext;
pub use iam::AccessRole;

// Error handling
pub use error::{ServiceError, classify_anyhow_error, classify_service_error};

// Cleanup outcomes
pub use cleanup::CleanupResult;
