//! recsys-coordinator - recommendation-service lifecycle orchestrator
//!
//! This crate provisions the ordered chain of recommendation resources
//! (dataset group through campaign, plus the training-data bucket and access
//! role), records what it created, and tears it down again in reverse.

pub mod aws;
pub mod config;
pub mod dataset;
pub mod logging;
pub mod orchestrator;
pub mod retry;
pub mod state;
pub mod wait;

#[cfg(test)]
mod testing;
