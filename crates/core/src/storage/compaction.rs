// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot/compaction manager
//!
//! Compaction folds a prefix of the tail into the snapshot and writes the
//! result as the next generation. Only records that every registered replica
//! has exchanged are folded, so no replica can miss a record because it was
//! compacted away.

use super::layout::LogDir;
use super::lock;
use super::reader::LogReader;
use super::snapshot::{self, FoldedIds, Snapshot, SnapshotHeader, SNAPSHOT_VERSION};
use super::walk::{walk, Segment};
use super::writer::heal_partial_tail;
use crate::clock::SystemClock;
use crate::config::LogConfig;
use crate::error::LogError;
use crate::frame;
use crate::id::UuidIdGen;
use crate::record::Record;
use crate::replica::ReplicaRegistry;
use crate::watermark::Watermark;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Caller-supplied reduction of records into state
///
/// Compaction preserves state only if applying records one by one gives the
/// same result regardless of where the snapshot boundary falls, i.e. `apply`
/// depends on nothing but the state and the record.
pub trait Fold {
    type State: Serialize + DeserializeOwned + Default + Clone;

    fn apply(&self, state: &mut Self::State, record: &Record);
}

/// What a compaction run did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompactionOutcome {
    pub from_generation: u64,
    /// Equal to `from_generation` when there was nothing to fold
    pub to_generation: u64,
    /// Watermark actually used after clamping by replica progress
    pub effective_up_to: Watermark,
    /// Snapshot watermark after compaction
    pub snapshot_watermark: Watermark,
    /// Records folded by this run
    pub records_folded: u64,
    /// Records left in the new tail
    pub tail_records: u64,
    /// Bytes of a crashed writer's partial frame removed first
    pub healed_bytes: u64,
}

/// When compaction is worth running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactionPolicy {
    pub min_records: u64,
}

impl Default for CompactionPolicy {
    fn default() -> Self {
        Self { min_records: 1024 }
    }
}

impl CompactionPolicy {
    /// Whether at least `min_records` tail records could be folded now
    pub fn should_compact(
        &self,
        dir: &Path,
        up_to: &Watermark,
        config: &LogConfig,
    ) -> Result<bool, LogError> {
        let dir = LogDir::open(dir)?;
        let clamp = effective_watermark(&dir, up_to)?;
        let reader = LogReader::open(dir.log_path(dir.generation()?))
            .with_max_body_len(config.max_frame_len());
        let mut foldable = 0u64;
        for record in reader.records()? {
            if !clamp.covers_record(&record?) {
                break;
            }
            foldable += 1;
            if foldable >= self.min_records {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Fold tail records covered by `up_to` into a new snapshot generation
///
/// Takes the log lock for the whole run. Refuses with `CompactionBlocked`
/// while the tail has interior damage; run a rebuild first.
pub fn compact<F: Fold>(
    dir: &Path,
    fold: &F,
    up_to: &Watermark,
    config: &LogConfig,
) -> Result<CompactionOutcome, LogError> {
    let dir = LogDir::open(dir)?;
    let guard = lock::acquire(&dir.lock_path(), config, &SystemClock, &UuidIdGen)?;
    let from = dir.generation()?;
    dir.remove_other_generations(from)?;

    let reader = LogReader::open(dir.log_path(from)).with_max_body_len(config.max_frame_len());
    let mut records = Vec::new();
    let mut damaged_spans = 0;
    let mut partial = None;
    walk::<LogError>(&reader, 0, config.max_frame_len(), |segment| {
        match segment {
            Segment::Record { record, .. } => records.push(record),
            Segment::Damaged { .. } => damaged_spans += 1,
            Segment::PartialTail { start, end } => partial = Some((start, end)),
        }
        Ok(())
    })?;
    if damaged_spans > 0 {
        tracing::warn!(generation = from, damaged_spans, "compaction blocked by tail damage");
        return Err(LogError::CompactionBlocked { damaged_spans });
    }
    let mut healed_bytes = 0;
    if let Some((start, end)) = partial {
        heal_partial_tail(reader.path(), start, end)?;
        healed_bytes = end - start;
    }

    let effective_up_to = effective_watermark(&dir, up_to)?;
    let split = records
        .iter()
        .take_while(|r| effective_up_to.covers_record(r))
        .count();

    let previous: Option<Snapshot<F::State>> = snapshot::read_snapshot(&dir.snapshot_path(from))?;
    let (mut state, mut header, mut folded_ids) = match previous {
        Some(s) => (s.state, s.header, s.folded),
        None => (
            F::State::default(),
            SnapshotHeader {
                version: SNAPSHOT_VERSION,
                generation: from,
                watermark: Watermark::new(),
                max_logical_clock: 0,
                records_folded: 0,
                created_at: chrono::Utc::now(),
            },
            FoldedIds::new(),
        ),
    };

    if split == 0 {
        guard.release()?;
        tracing::info!(generation = from, "nothing to compact");
        return Ok(CompactionOutcome {
            from_generation: from,
            to_generation: from,
            effective_up_to,
            snapshot_watermark: header.watermark,
            records_folded: 0,
            tail_records: records.len() as u64,
            healed_bytes,
        });
    }

    let (folded, tail) = records.split_at(split);
    for record in folded {
        fold.apply(&mut state, record);
        folded_ids.insert(record);
        header.watermark.observe(record);
        header.max_logical_clock = header.max_logical_clock.max(record.logical_clock);
    }
    let to = from + 1;
    header.generation = to;
    header.records_folded += folded.len() as u64;
    header.created_at = chrono::Utc::now();
    let snapshot_watermark = header.watermark.clone();

    let snapshot_json = serde_json::to_vec_pretty(&Snapshot {
        header,
        folded: folded_ids,
        state,
    })?;
    dir.install_generation(
        to,
        &frame::encode_all(tail),
        tail.len() as u64,
        Some(&snapshot_json),
        config.max_frame_len(),
    )?;
    guard.release()?;

    tracing::info!(
        from_generation = from,
        to_generation = to,
        records_folded = folded.len(),
        tail_records = tail.len(),
        "compacted log"
    );
    Ok(CompactionOutcome {
        from_generation: from,
        to_generation: to,
        effective_up_to,
        snapshot_watermark,
        records_folded: folded.len() as u64,
        tail_records: tail.len() as u64,
        healed_bytes,
    })
}

/// Snapshot state folded with every valid tail record
pub fn replay<F: Fold>(dir: &Path, fold: &F) -> Result<F::State, LogError> {
    let dir = LogDir::open(dir)?;
    let generation = dir.generation()?;
    let mut state = snapshot::read_snapshot::<F::State>(&dir.snapshot_path(generation))?
        .map(|s| s.state)
        .unwrap_or_default();
    for record in LogReader::open(dir.log_path(generation)).records()? {
        fold.apply(&mut state, &record?);
    }
    Ok(state)
}

/// `up_to` clamped by what every registered replica has exchanged
fn effective_watermark(dir: &LogDir, up_to: &Watermark) -> Result<Watermark, LogError> {
    Ok(match ReplicaRegistry::new(dir).common_watermark()? {
        Some(common) => up_to.meet(&common),
        None => up_to.clone(),
    })
}

#[cfg(test)]
#[path = "compaction_tests.rs"]
mod tests;
