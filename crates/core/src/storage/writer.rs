// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atomic record writer
//!
//! Every append happens under the log lock: catch up with what other
//! processes wrote, stage the encoded frame in `staging/` and fsync it, then
//! extend the tail with a single write and fsync. The tail only ever grows by
//! whole frames that were durable before `append` returns; a crash part-way
//! leaves a partial tail that the next lock holder truncates.

use super::fsync::{fsync_dir, remove_if_exists, write_synced};
use super::layout::LogDir;
use super::lock::{self, LockGuard};
use super::reader::LogReader;
use super::snapshot::{self, FoldedIds};
use super::walk::{walk, Segment};
use crate::clock::{Clock, LamportClock, SystemClock};
use crate::config::LogConfig;
use crate::error::LogError;
use crate::frame;
use crate::id::{IdGen, OriginId, RecordId, UuidIdGen};
use crate::merge::ForkDetected;
use crate::record::{Checksum, Record};
use crate::watermark::Watermark;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Outcome of committing merged records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommitSummary {
    /// Records written to the tail (forks included)
    pub appended: usize,
    /// Already present with the same checksum, in the tail or the snapshot
    pub duplicates: usize,
    /// Present with a different checksum; appended so both versions survive
    pub forks: usize,
    /// Identities that gained a version, each with every checksum now known
    pub forked: Vec<ForkDetected>,
    /// Failed checksum verification; never written
    pub rejected: usize,
}

/// What the writer knows about the log on disk
#[derive(Debug, Default)]
struct LogView {
    generation: u64,
    /// Tail bytes already scanned
    offset: u64,
    snapshot_mark: Watermark,
    /// Checksums of identities folded into the snapshot
    folded: FoldedIds,
    /// Highest sequence per origin across snapshot and tail
    seen: Watermark,
    lamport: LamportClock,
    identities: HashMap<RecordId, Vec<Checksum>>,
    damaged_spans: usize,
}

impl LogView {
    fn index(&mut self, record: &Record) {
        self.seen.observe(record);
        self.lamport.observe(record.logical_clock);
        let sums = self.identities.entry(record.id()).or_default();
        if !sums.contains(&record.checksum) {
            sums.push(record.checksum);
        }
    }

    /// Checksums held for an identity across snapshot and tail, sorted
    fn known_checksums(&self, id: &RecordId) -> Vec<Checksum> {
        let mut sums = self.folded.checksums(id).to_vec();
        sums.extend(self.identities.get(id).into_iter().flatten().copied());
        sums.sort();
        sums.dedup();
        sums
    }

    fn contains(&self, record: &Record) -> Presence {
        let id = record.id();
        let folded = self.folded.checksums(&id);
        let tail = self.identities.get(&id).map(Vec::as_slice).unwrap_or_default();
        if folded.contains(&record.checksum) || tail.contains(&record.checksum) {
            return Presence::Same;
        }
        if !folded.is_empty() || !tail.is_empty() {
            return Presence::Forked;
        }
        if self.snapshot_mark.covers_record(record) {
            // Folded before identities were kept with the snapshot
            return Presence::Folded;
        }
        Presence::Absent
    }
}

enum Presence {
    Absent,
    Same,
    Forked,
    Folded,
}

/// Appends records to a log directory on behalf of one origin
pub struct LogWriter<C: Clock = SystemClock, G: IdGen = UuidIdGen> {
    dir: LogDir,
    origin: OriginId,
    config: LogConfig,
    clock: C,
    ids: G,
    view: LogView,
}

impl LogWriter {
    /// Open a writer with the system clock and UUID lock tokens
    pub fn open(
        dir: impl Into<PathBuf>,
        origin: OriginId,
        config: LogConfig,
    ) -> Result<Self, LogError> {
        Self::open_with(dir, origin, config, SystemClock, UuidIdGen)
    }
}

impl<C: Clock, G: IdGen> LogWriter<C, G> {
    pub fn open_with(
        dir: impl Into<PathBuf>,
        origin: OriginId,
        config: LogConfig,
        clock: C,
        ids: G,
    ) -> Result<Self, LogError> {
        let dir = LogDir::open(dir)?;
        let mut writer = Self {
            dir,
            origin,
            config,
            clock,
            ids,
            view: LogView::default(),
        };
        writer.reload()?;
        writer.catch_up(None)?;
        tracing::debug!(
            dir = %writer.dir.path().display(),
            origin = %writer.origin,
            generation = writer.view.generation,
            last_sequence = writer.last_sequence(),
            logical_clock = writer.logical_clock(),
            "opened log writer"
        );
        Ok(writer)
    }

    pub fn origin(&self) -> &OriginId {
        &self.origin
    }

    pub fn dir(&self) -> &LogDir {
        &self.dir
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Last sequence known for this writer's origin
    pub fn last_sequence(&self) -> u64 {
        self.view.seen.get(&self.origin)
    }

    /// Current Lamport time
    pub fn logical_clock(&self) -> u64 {
        self.view.lamport.value()
    }

    pub fn generation(&self) -> u64 {
        self.view.generation
    }

    /// Damaged tail spans skipped while scanning
    pub fn damaged_spans(&self) -> usize {
        self.view.damaged_spans
    }

    /// Highest sequence per origin present in snapshot and tail
    pub fn watermark(&self) -> &Watermark {
        &self.view.seen
    }

    /// Durably append one record for this writer's origin
    pub fn append(&mut self, payload: impl Into<Vec<u8>>) -> Result<Record, LogError> {
        let payload = payload.into();
        if payload.len() > self.config.max_payload_len {
            return Err(LogError::PayloadTooLarge {
                len: payload.len(),
                max: self.config.max_payload_len,
            });
        }

        let guard = self.lock()?;
        self.catch_up(Some(&guard))?;

        let logical_clock = self.view.lamport.tick();
        let sequence = self.last_sequence() + 1;
        let record = Record::new(
            self.origin.clone(),
            sequence,
            logical_clock,
            self.clock.wall_micros(),
            payload,
        );
        let bytes = frame::encode(&record);
        self.persist(&bytes, &guard)?;
        self.view.index(&record);
        self.view.offset += bytes.len() as u64;
        guard.release()?;

        tracing::debug!(
            id = %record.id(),
            clock = record.logical_clock,
            checksum = %record.checksum.short(),
            "appended record"
        );
        Ok(record)
    }

    /// Durably commit records received from other replicas
    ///
    /// Records already present (same identity and checksum, or folded into
    /// the snapshot) are skipped. A record whose identity is present with a
    /// different checksum is a fork and is appended alongside the existing
    /// version. Records that fail verification are rejected.
    pub fn commit_merged(&mut self, records: &[Record]) -> Result<CommitSummary, LogError> {
        let mut summary = CommitSummary::default();
        if records.is_empty() {
            return Ok(summary);
        }

        let guard = self.lock()?;
        self.catch_up(Some(&guard))?;

        let mut batch: Vec<&Record> = Vec::new();
        let mut forked_ids: BTreeSet<RecordId> = BTreeSet::new();
        let mut max_clock = 0;
        for record in records {
            if !record.verify() {
                tracing::warn!(id = %record.id(), "rejecting record with bad checksum");
                summary.rejected += 1;
                continue;
            }
            let mut presence = self.view.contains(record);
            for earlier in batch.iter().filter(|b| {
                b.origin_id == record.origin_id && b.sequence == record.sequence
            }) {
                presence = match (presence, earlier.checksum == record.checksum) {
                    (Presence::Absent | Presence::Forked, true) => Presence::Same,
                    (Presence::Absent, false) => Presence::Forked,
                    (other, _) => other,
                };
            }
            match presence {
                Presence::Same | Presence::Folded => {
                    summary.duplicates += 1;
                    continue;
                }
                Presence::Forked => {
                    tracing::warn!(
                        id = %record.id(),
                        checksum = %record.checksum.short(),
                        "fork detected; keeping both versions"
                    );
                    summary.forks += 1;
                    forked_ids.insert(record.id());
                }
                Presence::Absent => {}
            }
            max_clock = max_clock.max(record.logical_clock);
            batch.push(record);
        }

        if !batch.is_empty() {
            let bytes = frame::encode_all(batch.iter().copied());
            self.persist(&bytes, &guard)?;
            for record in &batch {
                self.view.index(record);
            }
            self.view.offset += bytes.len() as u64;
            self.view.lamport.observe(max_clock);
            self.view.lamport.tick();
            summary.appended = batch.len();
        }
        summary.forked = forked_ids
            .into_iter()
            .map(|id| ForkDetected {
                checksums: self.view.known_checksums(&id),
                id,
            })
            .collect();
        guard.release()?;

        tracing::info!(
            appended = summary.appended,
            duplicates = summary.duplicates,
            forks = summary.forks,
            rejected = summary.rejected,
            "committed merged records"
        );
        Ok(summary)
    }

    fn lock(&self) -> Result<LockGuard, LogError> {
        lock::acquire(&self.dir.lock_path(), &self.config, &self.clock, &self.ids)
    }

    fn tail_reader(&self) -> LogReader {
        LogReader::open(self.dir.log_path(self.view.generation))
            .with_max_body_len(self.config.max_frame_len())
    }

    /// Reset the view to the current generation's snapshot
    fn reload(&mut self) -> Result<(), LogError> {
        let generation = self.dir.generation()?;
        let mut view = LogView {
            generation,
            ..LogView::default()
        };
        let snapshot_path = self.dir.snapshot_path(generation);
        if let Some((header, folded)) = snapshot::read_folded(&snapshot_path)? {
            view.lamport.observe(header.max_logical_clock);
            view.seen = header.watermark.clone();
            view.snapshot_mark = header.watermark;
            view.folded = folded;
        }
        self.view = view;
        Ok(())
    }

    /// Scan frames appended since the last look
    ///
    /// With the lock held, a partial tail left by a crashed writer is
    /// truncated and leftover files of other generations are removed.
    fn catch_up(&mut self, guard: Option<&LockGuard>) -> Result<(), LogError> {
        let generation = self.dir.generation()?;
        let tail_len = self.tail_reader().file_len()?;
        let rescan = generation != self.view.generation || tail_len < self.view.offset;
        if rescan {
            tracing::info!(
                from = self.view.generation,
                to = generation,
                "log generation changed; rescanning"
            );
            self.reload()?;
        }
        if guard.is_some() && (rescan || self.view.offset == 0) {
            self.dir.remove_other_generations(generation)?;
            self.dir.remove_orphaned_staging()?;
        }

        let reader = self.tail_reader();
        let max_body_len = self.config.max_frame_len();
        let mut partial = None;
        let view = &mut self.view;
        let end = walk::<LogError>(&reader, view.offset, max_body_len, |segment| {
            match segment {
                Segment::Record { record, .. } => view.index(&record),
                Segment::Damaged { start, end, .. } => {
                    view.damaged_spans += 1;
                    tracing::warn!(start, end, "skipping damaged span in log tail");
                }
                Segment::PartialTail { start, end } => partial = Some((start, end)),
            }
            Ok(())
        })?;
        self.view.offset = end;

        if let (Some((start, end)), Some(_)) = (partial, guard) {
            heal_partial_tail(reader.path(), start, end)?;
            self.dir.remove_orphaned_staging()?;
        }
        Ok(())
    }

    /// Stage, then append with a single write, fsyncing both
    fn persist(&self, bytes: &[u8], guard: &LockGuard) -> Result<(), LogError> {
        let staging = self.dir.staging_dir().join(format!(
            "{}-{}.frame",
            guard.holder().pid,
            guard.holder().token
        ));
        write_synced(&staging, bytes)?;

        let tail = self.dir.log_path(self.view.generation);
        let created = !tail.exists();
        let mut file = OpenOptions::new().create(true).append(true).open(&tail)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        if created {
            fsync_dir(self.dir.path())?;
        }

        remove_if_exists(&staging)?;
        Ok(())
    }
}

/// Truncate a never-acknowledged partial frame off the tail
///
/// Caller must hold the lock.
pub(crate) fn heal_partial_tail(path: &Path, start: u64, end: u64) -> Result<(), LogError> {
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_len(start)?;
    file.sync_all()?;
    tracing::info!(
        path = %path.display(),
        offset = start,
        bytes_dropped = end - start,
        "truncated partial frame from log tail"
    );
    Ok(())
}

#[cfg(test)]
#[path = "writer_tests.rs"]
mod tests;
