// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Replica registry: per-replica sync watermarks kept next to the log
//!
//! Each replica has `replicas/<name>.json`. Marks only move forward; saving
//! joins with whatever is already on disk.

use crate::error::LogError;
use crate::id::is_valid_name;
use crate::storage::fsync::write_atomic;
use crate::storage::LogDir;
use crate::watermark::Watermark;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Sync progress with one replica
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaState {
    pub name: String,
    /// Local records the replica has stored
    #[serde(default)]
    pub pushed: Watermark,
    /// Replica records committed locally
    #[serde(default)]
    pub pulled: Watermark,
    /// Held by both sides
    #[serde(default)]
    pub exchanged: Watermark,
    #[serde(default)]
    pub last_sync_micros: Option<u64>,
}

impl ReplicaState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pushed: Watermark::new(),
            pulled: Watermark::new(),
            exchanged: Watermark::new(),
            last_sync_micros: None,
        }
    }

    /// Pointwise maximum of two states for the same replica
    pub fn join(&self, other: &ReplicaState) -> ReplicaState {
        ReplicaState {
            name: self.name.clone(),
            pushed: self.pushed.join(&other.pushed),
            pulled: self.pulled.join(&other.pulled),
            exchanged: self.exchanged.join(&other.exchanged),
            last_sync_micros: self.last_sync_micros.max(other.last_sync_micros),
        }
    }
}

/// The replicas known to a log directory
#[derive(Debug, Clone)]
pub struct ReplicaRegistry {
    dir: PathBuf,
}

impl ReplicaRegistry {
    pub fn new(log_dir: &LogDir) -> Self {
        Self {
            dir: log_dir.replicas_dir(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn state_path(&self, name: &str) -> Result<PathBuf, LogError> {
        if !is_valid_name(name) {
            return Err(LogError::InvalidReplicaName(name.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", name)))
    }

    /// State for `name`, or a fresh one if never saved
    pub fn load(&self, name: &str) -> Result<ReplicaState, LogError> {
        let path = self.state_path(name)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ReplicaState::new(name)),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist a state, never moving any mark backwards
    pub fn save(&self, state: &ReplicaState) -> Result<ReplicaState, LogError> {
        let merged = self.load(&state.name)?.join(state);
        std::fs::create_dir_all(&self.dir)?;
        write_atomic(
            &self.state_path(&merged.name)?,
            &serde_json::to_vec_pretty(&merged)?,
        )?;
        tracing::debug!(
            replica = %merged.name,
            pushed = %merged.pushed,
            pulled = %merged.pulled,
            "saved replica watermarks"
        );
        Ok(merged)
    }

    /// All registered replicas, sorted by name
    pub fn list(&self) -> Result<Vec<ReplicaState>, LogError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut states = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = std::fs::read(&path)?;
            states.push(serde_json::from_slice::<ReplicaState>(&bytes)?);
        }
        states.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(states)
    }

    /// Records every registered replica is known to hold
    ///
    /// `None` when no replica is registered, meaning nothing constrains
    /// compaction.
    pub fn common_watermark(&self) -> Result<Option<Watermark>, LogError> {
        let states = self.list()?;
        let mut marks = states.iter().map(|s| &s.exchanged);
        let Some(first) = marks.next() else {
            return Ok(None);
        };
        Ok(Some(marks.fold(first.clone(), |acc, mark| acc.meet(mark))))
    }
}

#[cfg(test)]
#[path = "replica_tests.rs"]
mod tests;
