//! Append-only progress log, one JSON object per line.
//!
//! Written after every scenario so an interrupted run can be resumed:
//! completed scenarios are not repeated and claims registered but never
//! attempted are picked up again.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use super::claims::PendingClaim;
use super::report::TestResult;
use crate::core::errors::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CheckpointRecord {
    RunStarted { run_id: Uuid },
    ScenarioCompleted { index: usize, result: TestResult },
    ClaimRegistered { claim: PendingClaim },
    ClaimAttempted { source_tx_hash: String },
}

/// State reconstructed from a checkpoint file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckpointState {
    pub completed: BTreeMap<usize, TestResult>,
    /// Registered claims with no recorded attempt, in registration order.
    pub pending_claims: Vec<PendingClaim>,
}

impl CheckpointState {
    pub fn is_completed(&self, index: usize) -> bool {
        self.completed.contains_key(&index)
    }
}

#[derive(Debug, Clone)]
pub struct CheckpointLog {
    path: PathBuf,
}

impl CheckpointLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Starts a fresh log, discarding any previous run.
    pub fn reset(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    pub fn append(&self, record: &CheckpointRecord) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Reads the log. A missing file is an empty state; unreadable lines
    /// (typically a torn final write) are skipped.
    pub fn load(&self) -> Result<CheckpointState> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No checkpoint to resume from");
            return Ok(CheckpointState::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        let mut completed = BTreeMap::new();
        let mut registered = Vec::new();
        let mut attempted = HashSet::new();
        for (number, line) in content.lines().enumerate().filter(|(_, l)| !l.trim().is_empty()) {
            match serde_json::from_str::<CheckpointRecord>(line) {
                Ok(CheckpointRecord::RunStarted { .. }) => {}
                Ok(CheckpointRecord::ScenarioCompleted { index, result }) => {
                    completed.insert(index, result);
                }
                Ok(CheckpointRecord::ClaimRegistered { claim }) => registered.push(claim),
                Ok(CheckpointRecord::ClaimAttempted { source_tx_hash }) => {
                    attempted.insert(source_tx_hash.to_lowercase());
                }
                Err(e) => warn!(line = number + 1, error = %e, "Skipping unreadable checkpoint line"),
            }
        }
        let pending_claims = registered
            .into_iter()
            .filter(|c: &PendingClaim| !attempted.contains(&c.source_tx_hash.to_lowercase()))
            .collect();
        Ok(CheckpointState { completed, pending_claims })
    }
}
