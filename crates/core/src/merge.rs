// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Replica merge engine
//!
//! Merging is a set union keyed by record identity and content checksum,
//! emitted in one canonical order: `(logical_clock, origin, sequence,
//! checksum)`. Because the order depends only on the union, merge is
//! commutative, associative and idempotent, and replicas holding the same
//! records produce byte-identical merged files.

use crate::error::LogError;
use crate::frame;
use crate::id::RecordId;
use crate::record::{Checksum, Record};
use crate::storage::fsync::write_atomic;
use crate::storage::walk::{walk, Segment};
use crate::storage::{LogDir, LogReader};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One identity seen with more than one checksum
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForkDetected {
    pub id: RecordId,
    /// Every distinct checksum, in lexical order
    pub checksums: Vec<Checksum>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    /// Canonically ordered union; every fork version included
    pub records: Vec<Record>,
    pub forks: Vec<ForkDetected>,
    /// Copies dropped because an identical record was already present
    pub duplicates_dropped: usize,
    /// Records dropped because their checksum does not verify
    pub rejected: usize,
}

/// Merge any number of record sets into one canonical sequence
pub fn merge<I, L>(logs: I) -> MergeOutcome
where
    I: IntoIterator<Item = L>,
    L: IntoIterator<Item = Record>,
{
    let mut by_id: BTreeMap<RecordId, BTreeMap<Checksum, Record>> = BTreeMap::new();
    let mut duplicates_dropped = 0;
    let mut rejected = 0;

    for record in logs.into_iter().flatten() {
        if !record.verify() {
            tracing::warn!(id = %record.id(), "dropping record with bad checksum from merge");
            rejected += 1;
            continue;
        }
        let versions = by_id.entry(record.id()).or_default();
        match versions.get_mut(&record.checksum) {
            Some(kept) => {
                duplicates_dropped += 1;
                // Keep the earliest capture time so the result ignores input order
                if record.wall_time_micros < kept.wall_time_micros {
                    *kept = record;
                }
            }
            None => {
                versions.insert(record.checksum, record);
            }
        }
    }

    let mut forks = Vec::new();
    let mut records = Vec::new();
    for (id, versions) in by_id {
        if versions.len() > 1 {
            let checksums: Vec<Checksum> = versions.keys().copied().collect();
            tracing::warn!(%id, versions = checksums.len(), "fork detected");
            forks.push(ForkDetected { id, checksums });
        }
        records.extend(versions.into_values());
    }
    records.sort_by(|a, b| a.order_key().cmp(&b.order_key()));

    MergeOutcome {
        records,
        forks,
        duplicates_dropped,
        rejected,
    }
}

/// Summary of a file-level merge
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeFilesOutcome {
    pub output: PathBuf,
    pub records: usize,
    pub forks: Vec<ForkDetected>,
    pub duplicates_dropped: usize,
    pub rejected: usize,
    /// Inputs that had damaged spans and were salvaged
    pub salvaged_inputs: Vec<PathBuf>,
}

/// Merge frame files (or log directories) into a fresh frame file
///
/// Damaged inputs contribute every record that can be salvaged. The output
/// is replaced atomically.
pub fn merge_files(
    inputs: &[PathBuf],
    output: &Path,
    max_body_len: usize,
) -> Result<MergeFilesOutcome, LogError> {
    let mut logs = Vec::with_capacity(inputs.len());
    let mut salvaged_inputs = Vec::new();
    for input in inputs {
        let (records, damaged) = read_input(input, max_body_len)?;
        if damaged {
            tracing::warn!(input = %input.display(), "merging salvaged records from damaged input");
            salvaged_inputs.push(input.clone());
        }
        logs.push(records);
    }

    let outcome = merge(logs);
    write_atomic(output, &frame::encode_all(&outcome.records))?;
    tracing::info!(
        output = %output.display(),
        records = outcome.records.len(),
        forks = outcome.forks.len(),
        duplicates = outcome.duplicates_dropped,
        "wrote merged log"
    );

    Ok(MergeFilesOutcome {
        output: output.to_path_buf(),
        records: outcome.records.len(),
        forks: outcome.forks,
        duplicates_dropped: outcome.duplicates_dropped,
        rejected: outcome.rejected,
        salvaged_inputs,
    })
}

/// Valid records of one input and whether any damage was skipped
fn read_input(input: &Path, max_body_len: usize) -> Result<(Vec<Record>, bool), LogError> {
    let path = if input.is_dir() {
        let dir = LogDir::at(input);
        dir.log_path(dir.generation()?)
    } else {
        input.to_path_buf()
    };
    let reader = LogReader::open(path).with_max_body_len(max_body_len);
    let mut records = Vec::new();
    let mut damaged = false;
    walk::<LogError>(&reader, 0, max_body_len, |segment| {
        match segment {
            Segment::Record { record, .. } => records.push(record),
            Segment::Damaged { .. } | Segment::PartialTail { .. } => damaged = true,
        }
        Ok(())
    })?;
    Ok((records, damaged))
}

#[cfg(test)]
#[path = "merge_tests.rs"]
mod tests;
