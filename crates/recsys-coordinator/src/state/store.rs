//! JSON file persistence for run state

use super::types::RunState;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the run state inside the data directory
const STATE_FILE: &str = "run-state.json";

/// Reads and writes one run state file.
///
/// Single writer: one provision or teardown invocation owns the file for its
/// duration.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store in the platform data directory
    pub fn default_location() -> Result<Self> {
        let proj_dirs = ProjectDirs::from("", "", "recsys-lifecycle")
            .context("Failed to get project directories")?;
        Ok(Self::new(proj_dirs.data_local_dir().join(STATE_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the state file, if there is one
    pub fn load(&self) -> Result<Option<RunState>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read {}", self.path.display()));
            }
        };

        let state = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid run state in {}", self.path.display()))?;
        Ok(Some(state))
    }

    /// Write the state file atomically (temp file + rename)
    pub fn save(&self, state: &RunState) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir).context("Failed to create state directory")?;
            }
        }

        let json = serde_json::to_string_pretty(state).context("Failed to serialize run state")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        debug!(path = %self.path.display(), run_id = %state.run_id, "Run state saved");
        Ok(())
    }

    /// Remove the state file; a missing file is fine
    pub fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "Run state removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", self.path.display())),
        }
    }
}
