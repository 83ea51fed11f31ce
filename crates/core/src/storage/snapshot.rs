// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot files: folded state plus the watermark it represents
//!
//! A snapshot is a JSON document `{ "header": ..., "folded": ..., "state": ... }`.
//! The header can be read on its own for status. Writers also read `folded`,
//! the checksums of every folded identity, so a later version of an
//! identity that was already compacted is still recognised as a fork.

use super::fsync::write_synced;
use crate::error::LogError;
use crate::id::{OriginId, RecordId};
use crate::record::{Checksum, Record};
use crate::watermark::Watermark;
use chrono::{DateTime, Utc};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub version: u32,
    /// Generation this snapshot belongs to
    pub generation: u64,
    /// Every record at or below this mark is folded into the state
    pub watermark: Watermark,
    /// Highest logical clock among folded records
    pub max_logical_clock: u64,
    pub records_folded: u64,
    pub created_at: DateTime<Utc>,
}

/// Checksums of folded records, per origin and sequence
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FoldedIds(BTreeMap<OriginId, BTreeMap<u64, Vec<Checksum>>>);

impl FoldedIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: &Record) {
        let sums = self
            .0
            .entry(record.origin_id.clone())
            .or_default()
            .entry(record.sequence)
            .or_default();
        if !sums.contains(&record.checksum) {
            sums.push(record.checksum);
            sums.sort();
        }
    }

    /// Every folded checksum for an identity
    pub fn checksums(&self, id: &RecordId) -> &[Checksum] {
        self.0
            .get(&id.origin)
            .and_then(|seqs| seqs.get(&id.sequence))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Number of folded identities
    pub fn len(&self) -> usize {
        self.0.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<S> {
    pub header: SnapshotHeader,
    #[serde(default)]
    pub folded: FoldedIds,
    pub state: S,
}

#[derive(Deserialize)]
struct HeaderOnly {
    header: SnapshotHeader,
    #[serde(rename = "state")]
    _state: IgnoredAny,
}

#[derive(Deserialize)]
struct HeaderAndFolded {
    header: SnapshotHeader,
    #[serde(default)]
    folded: FoldedIds,
    #[serde(rename = "state")]
    _state: IgnoredAny,
}

/// Read just the header; `None` if the file does not exist
pub fn read_header(path: &Path) -> Result<Option<SnapshotHeader>, LogError> {
    let Some(reader) = open(path)? else {
        return Ok(None);
    };
    let doc: HeaderOnly = serde_json::from_reader(reader)
        .map_err(|e| LogError::Snapshot(format!("{}: {}", path.display(), e)))?;
    check_version(&doc.header)?;
    Ok(Some(doc.header))
}

/// Read the header and folded identities, skipping the state
pub fn read_folded(path: &Path) -> Result<Option<(SnapshotHeader, FoldedIds)>, LogError> {
    let Some(reader) = open(path)? else {
        return Ok(None);
    };
    let doc: HeaderAndFolded = serde_json::from_reader(reader)
        .map_err(|e| LogError::Snapshot(format!("{}: {}", path.display(), e)))?;
    check_version(&doc.header)?;
    Ok(Some((doc.header, doc.folded)))
}

/// Read header and state; `None` if the file does not exist
pub fn read_snapshot<S: DeserializeOwned>(path: &Path) -> Result<Option<Snapshot<S>>, LogError> {
    let Some(reader) = open(path)? else {
        return Ok(None);
    };
    let snapshot: Snapshot<S> = serde_json::from_reader(reader)
        .map_err(|e| LogError::Snapshot(format!("{}: {}", path.display(), e)))?;
    check_version(&snapshot.header)?;
    Ok(Some(snapshot))
}

/// Write a snapshot to `path` and fsync it (no rename)
pub fn write_snapshot<S: Serialize>(path: &Path, snapshot: &Snapshot<S>) -> Result<(), LogError> {
    let bytes = serde_json::to_vec_pretty(snapshot)?;
    write_synced(path, &bytes)?;
    Ok(())
}

fn open(path: &Path) -> Result<Option<BufReader<File>>, LogError> {
    match File::open(path) {
        Ok(file) => Ok(Some(BufReader::new(file))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn check_version(header: &SnapshotHeader) -> Result<(), LogError> {
    if header.version != SNAPSHOT_VERSION {
        return Err(LogError::Snapshot(format!(
            "unsupported snapshot version {}",
            header.version
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
