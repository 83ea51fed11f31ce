// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk layout of a log directory
//!
//! ```text
//! CURRENT                  decimal generation number
//! log.<gen:08>             frames of the current tail
//! snapshot.<gen:08>.json   compacted state the tail continues from
//! log.lock                 lock side file
//! staging/                 per-writer staging frames
//! quarantine/              forensic copies of damaged spans
//! replicas/<name>.json     per-replica sync watermarks
//! ```

use super::fsync::{
    create_atomic, fsync_dir, remove_if_exists, temp_path, write_atomic, write_synced,
};
use super::reader::LogReader;
use super::snapshot;
use crate::error::LogError;
use std::path::{Path, PathBuf};

const CURRENT_FILE: &str = "CURRENT";
const LOCK_FILE: &str = "log.lock";
const LOG_PREFIX: &str = "log.";
const SNAPSHOT_PREFIX: &str = "snapshot.";
const SNAPSHOT_SUFFIX: &str = ".json";

/// Handle on a log directory
#[derive(Debug, Clone)]
pub struct LogDir {
    root: PathBuf,
}

impl LogDir {
    /// Open a log directory, creating an empty generation 0 log if missing
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, LogError> {
        let dir = Self { root: root.into() };
        std::fs::create_dir_all(&dir.root)?;
        for sub in [dir.staging_dir(), dir.quarantine_dir(), dir.replicas_dir()] {
            std::fs::create_dir_all(sub)?;
        }
        if !dir.current_path().exists() {
            // Racing first opens: whoever links CURRENT first wins
            create_atomic(&dir.current_path(), b"0")?;
        }
        Ok(dir)
    }

    /// Handle on a directory without creating anything
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Generation named by `CURRENT`
    pub fn generation(&self) -> Result<u64, LogError> {
        let raw = match std::fs::read_to_string(self.current_path()) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        raw.trim()
            .parse()
            .map_err(|_| LogError::InvalidGeneration(raw.trim().to_string()))
    }

    /// Durably switch `CURRENT` to a new generation
    pub(crate) fn set_generation(&self, generation: u64) -> Result<(), LogError> {
        write_atomic(&self.current_path(), generation.to_string().as_bytes())?;
        Ok(())
    }

    pub fn current_path(&self) -> PathBuf {
        self.root.join(CURRENT_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    pub fn log_path(&self, generation: u64) -> PathBuf {
        self.root.join(format!("{}{:08}", LOG_PREFIX, generation))
    }

    pub fn snapshot_path(&self, generation: u64) -> PathBuf {
        self.root
            .join(format!("{}{:08}{}", SNAPSHOT_PREFIX, generation, SNAPSHOT_SUFFIX))
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.root.join("staging")
    }

    pub fn quarantine_dir(&self) -> PathBuf {
        self.root.join("quarantine")
    }

    pub fn replicas_dir(&self) -> PathBuf {
        self.root.join("replicas")
    }

    /// Reader over the current generation's tail
    pub fn reader(&self) -> Result<LogReader, LogError> {
        Ok(LogReader::open(self.log_path(self.generation()?)))
    }

    /// Durably install a new generation and retire the current one
    ///
    /// The tail (and snapshot, if any) are written to temporaries and read
    /// back before anything is renamed. `CURRENT` switches only once both
    /// renames are durable, so a crash leaves either generation intact.
    /// Caller must hold the lock.
    pub(crate) fn install_generation(
        &self,
        generation: u64,
        tail: &[u8],
        expected_records: u64,
        snapshot_json: Option<&[u8]>,
        max_body_len: usize,
    ) -> Result<(), LogError> {
        let log_path = self.log_path(generation);
        let log_tmp = temp_path(&log_path);
        write_synced(&log_tmp, tail)?;
        let validation = LogReader::open(&log_tmp)
            .with_max_body_len(max_body_len)
            .validate()?;
        if !validation.is_clean() || validation.records != expected_records {
            return Err(LogError::ValidationFailed {
                path: log_tmp,
                reason: format!(
                    "read back {} of {} records, stop {:?}",
                    validation.records, expected_records, validation.stop
                ),
            });
        }

        let snapshot_path = self.snapshot_path(generation);
        let snapshot_tmp = temp_path(&snapshot_path);
        if let Some(json) = snapshot_json {
            write_synced(&snapshot_tmp, json)?;
            let header = snapshot::read_header(&snapshot_tmp)?;
            if header.map(|h| h.generation) != Some(generation) {
                return Err(LogError::ValidationFailed {
                    path: snapshot_tmp,
                    reason: "snapshot header does not name the new generation".to_string(),
                });
            }
        }

        std::fs::rename(&log_tmp, &log_path)?;
        if snapshot_json.is_some() {
            std::fs::rename(&snapshot_tmp, &snapshot_path)?;
        }
        fsync_dir(&self.root)?;
        self.set_generation(generation)?;
        self.remove_other_generations(generation)?;
        Ok(())
    }

    /// Remove files belonging to any generation other than `keep`
    ///
    /// Must only be called by the lock holder. Newer generations are leftovers
    /// of an interrupted compaction or rebuild; older ones are retired state.
    pub(crate) fn remove_other_generations(&self, keep: u64) -> Result<Vec<PathBuf>, LogError> {
        let mut removed = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let generation = parse_log_generation(name).or_else(|| parse_snapshot_generation(name));
            let stale = match generation {
                Some(g) => g != keep,
                None => name.ends_with(".tmp"),
            };
            if stale && remove_if_exists(&entry.path())? {
                removed.push(entry.path());
            }
        }
        if !removed.is_empty() {
            fsync_dir(&self.root)?;
            tracing::info!(
                dir = %self.root.display(),
                generation = keep,
                removed = removed.len(),
                "removed files of other generations"
            );
        }
        Ok(removed)
    }

    /// Remove staging files left by writers that crashed mid-append
    ///
    /// Staging files only exist while their writer holds the lock, so any
    /// found by the current holder are orphans.
    pub(crate) fn remove_orphaned_staging(&self) -> Result<usize, LogError> {
        let mut removed = 0;
        for entry in std::fs::read_dir(self.staging_dir())? {
            let entry = entry?;
            if remove_if_exists(&entry.path())? {
                tracing::debug!(path = %entry.path().display(), "removed orphaned staging file");
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Generation number of a `log.<gen>` file name
pub fn parse_log_generation(name: &str) -> Option<u64> {
    let digits = name.strip_prefix(LOG_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Generation number of a `snapshot.<gen>.json` file name
pub fn parse_snapshot_generation(name: &str) -> Option<u64> {
    let digits = name
        .strip_prefix(SNAPSHOT_PREFIX)?
        .strip_suffix(SNAPSHOT_SUFFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
#[path = "layout_tests.rs"]
mod tests;
