//! Progress reporting abstractions for the orchestrator
//!
//! Provides the observer the pipelines notify as they advance, with a logging
//! implementation and one that checkpoints run state to disk.

use super::error::Target;
use crate::aws::CleanupResult;
use crate::state::{RunState, StateStore};
use tracing::{info, warn};

/// Trait for observing lifecycle progress
///
/// The pipelines call `state_changed` after every mutation of the run state,
/// so an implementation that persists it leaves a usable record even if the
/// process dies mid-stage.
pub trait RunObserver: Send + Sync {
    /// A creation stage or teardown step is starting
    fn step_started(&self, _target: Target) {}

    /// A teardown step finished
    fn step_finished(&self, _target: Target, _result: CleanupResult) {}

    /// The run state was mutated
    fn state_changed(&self, _state: &RunState) {}
}

/// Observer that only logs
#[derive(Debug, Default)]
pub struct LogObserver;

impl RunObserver for LogObserver {
    fn step_started(&self, target: Target) {
        info!(%target, "Step started");
    }

    fn step_finished(&self, target: Target, result: CleanupResult) {
        info!(%target, %result, "Step finished");
    }
}

/// Observer that saves the run state after every change
#[derive(Debug)]
pub struct CheckpointObserver {
    store: StateStore,
}

impl CheckpointObserver {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }
}

impl RunObserver for CheckpointObserver {
    fn step_started(&self, target: Target) {
        LogObserver.step_started(target);
    }

    fn step_finished(&self, target: Target, result: CleanupResult) {
        LogObserver.step_finished(target, result);
    }

    fn state_changed(&self, state: &RunState) {
        // Checkpoint failures never stop the pipeline
        if let Err(e) = self.store.save(state) {
            warn!(error = ?e, path = %self.store.path().display(), "Failed to checkpoint run state");
        }
    }
}
