// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Corruption guard: damage reports, tail healing and operator repair
//!
//! | Damage                          | Action                         | Finding               |
//! |---------------------------------|--------------------------------|-----------------------|
//! | Trailing partial frame          | Truncate (under the lock)      | `RecoveredTruncation` |
//! | Trailing partial, lock busy     | Nothing                        | `PendingTail`         |
//! | Interior undecodable bytes      | Quarantine span, resync        | `MidStreamCorruption` |
//! | Well-formed frame, bad checksum | Quarantine that frame          | `ChecksumMismatch`    |
//!
//! Only the trailing partial frame is ever removed automatically. Interior
//! damage leaves the log untouched until an operator runs `rebuild`.

use super::fsync::write_atomic;
use super::layout::LogDir;
use super::lock::{self, LockGuard};
use super::reader::{LogReader, StopKind};
use super::snapshot;
use super::walk::{read_span, walk, Segment};
use super::writer::heal_partial_tail;
use crate::clock::{Clock, SystemClock};
use crate::config::LogConfig;
use crate::error::LogError;
use crate::frame;
use crate::id::{IdGen, RecordId, UuidIdGen};
use crate::record::Record;
use serde::Serialize;
use std::path::PathBuf;

/// Byte range `[start, end)` within a tail file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start: u64,
    pub end: u64,
}

impl Span {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// One damage finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    /// A partial trailing frame was truncated away
    RecoveredTruncation { offset: u64, bytes_dropped: u64 },
    /// A partial trailing frame exists but a writer holds the lock
    PendingTail { offset: u64, bytes: u64 },
    /// Undecodable bytes between valid frames
    MidStreamCorruption {
        span: Span,
        reason: String,
        quarantined: Option<PathBuf>,
    },
    /// A well-formed frame whose record checksum does not verify
    ChecksumMismatch {
        record_id: RecordId,
        span: Span,
        quarantined: Option<PathBuf>,
    },
}

impl Finding {
    /// Interior damage that needs operator or merge attention
    pub fn is_interior(&self) -> bool {
        matches!(
            self,
            Finding::MidStreamCorruption { .. } | Finding::ChecksumMismatch { .. }
        )
    }
}

/// Complete damage report for a log's current tail
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub generation: u64,
    /// End of the longest valid prefix, after any healing
    pub valid_prefix_len: u64,
    pub file_len: u64,
    /// Valid records found anywhere in the tail
    pub records: u64,
    pub findings: Vec<Finding>,
}

impl ScanReport {
    pub fn needs_attention(&self) -> bool {
        self.findings.iter().any(Finding::is_interior)
    }

    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn interior_damage(&self) -> usize {
        self.findings.iter().filter(|f| f.is_interior()).count()
    }
}

/// Result of an explicit operator rebuild
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RebuildSummary {
    pub from_generation: u64,
    pub to_generation: u64,
    pub records_kept: u64,
    pub spans_quarantined: usize,
    pub bytes_dropped: u64,
}

/// What one pass over the tail found
#[derive(Debug, Default)]
struct Inspection {
    records: Vec<Record>,
    damaged: Vec<(Span, Finding)>,
    partial: Option<Span>,
    first_damage: Option<u64>,
    end: u64,
    file_len: u64,
}

pub struct CorruptionGuard<C: Clock = SystemClock, G: IdGen = UuidIdGen> {
    dir: LogDir,
    config: LogConfig,
    clock: C,
    ids: G,
}

impl CorruptionGuard {
    pub fn new(dir: impl Into<PathBuf>, config: LogConfig) -> Result<Self, LogError> {
        Self::with_clock(dir, config, SystemClock, UuidIdGen)
    }
}

impl<C: Clock, G: IdGen> CorruptionGuard<C, G> {
    pub fn with_clock(
        dir: impl Into<PathBuf>,
        config: LogConfig,
        clock: C,
        ids: G,
    ) -> Result<Self, LogError> {
        Ok(Self {
            dir: LogDir::open(dir)?,
            config,
            clock,
            ids,
        })
    }

    pub fn dir(&self) -> &LogDir {
        &self.dir
    }

    /// Scan the current tail and report every damaged region
    ///
    /// A trailing partial frame is truncated if the lock can be taken without
    /// waiting; interior damage is quarantined and reported, never removed.
    pub fn scan(&self) -> Result<ScanReport, LogError> {
        let generation = self.dir.generation()?;
        let first = self.inspect(generation)?;
        let Some(partial) = first.partial else {
            return self.report(generation, first, None);
        };

        let Some(guard) = lock::try_acquire(&self.dir.lock_path(), &self.clock, &self.ids)? else {
            tracing::info!(
                offset = partial.start,
                bytes = partial.len(),
                "partial tail present while a writer holds the lock"
            );
            let pending = Finding::PendingTail {
                offset: partial.start,
                bytes: partial.len(),
            };
            return self.report(generation, first, Some(pending));
        };

        // Re-validate under the lock: the writer may have finished meanwhile
        let generation = self.dir.generation()?;
        let mut second = self.inspect(generation)?;
        let healed = match second.partial.take() {
            Some(partial) => {
                heal_partial_tail(self.tail_reader(generation).path(), partial.start, partial.end)?;
                self.dir.remove_orphaned_staging()?;
                second.file_len = partial.start;
                Some(Finding::RecoveredTruncation {
                    offset: partial.start,
                    bytes_dropped: partial.len(),
                })
            }
            None => None,
        };
        let report = self.report(generation, second, healed);
        guard.release()?;
        report
    }

    /// Every valid record in the tail, reading across damaged spans
    pub fn salvage(&self) -> Result<Vec<Record>, LogError> {
        Ok(self.inspect(self.dir.generation()?)?.records)
    }

    /// Rewrite the tail without its damaged spans as a new generation
    ///
    /// Damaged spans are quarantined first; the snapshot is carried over.
    /// Never run automatically: this discards bytes an operator may want.
    pub fn rebuild(&self) -> Result<RebuildSummary, LogError> {
        let guard = self.lock()?;
        let from = self.dir.generation()?;
        let inspection = self.inspect(from)?;

        let mut spans_quarantined = 0;
        let mut bytes_dropped = 0;
        for (span, _) in &inspection.damaged {
            self.quarantine(from, *span)?;
            spans_quarantined += 1;
            bytes_dropped += span.len();
        }
        if let Some(partial) = inspection.partial {
            bytes_dropped += partial.len();
        }

        let to = from + 1;
        let carried = snapshot::read_snapshot::<serde_json::Value>(&self.dir.snapshot_path(from))?;
        let snapshot_json = match carried {
            Some(mut carried) => {
                carried.header.generation = to;
                Some(serde_json::to_vec_pretty(&carried)?)
            }
            None => None,
        };
        let tail = frame::encode_all(&inspection.records);
        let records_kept = inspection.records.len() as u64;
        self.dir.install_generation(
            to,
            &tail,
            records_kept,
            snapshot_json.as_deref(),
            self.config.max_frame_len(),
        )?;
        guard.release()?;

        tracing::info!(
            from_generation = from,
            to_generation = to,
            records_kept,
            spans_quarantined,
            bytes_dropped,
            "rebuilt log tail"
        );
        Ok(RebuildSummary {
            from_generation: from,
            to_generation: to,
            records_kept,
            spans_quarantined,
            bytes_dropped,
        })
    }

    fn lock(&self) -> Result<LockGuard, LogError> {
        lock::acquire(&self.dir.lock_path(), &self.config, &self.clock, &self.ids)
    }

    fn tail_reader(&self, generation: u64) -> LogReader {
        LogReader::open(self.dir.log_path(generation)).with_max_body_len(self.config.max_frame_len())
    }

    fn inspect(&self, generation: u64) -> Result<Inspection, LogError> {
        let reader = self.tail_reader(generation);
        let mut inspection = Inspection::default();
        let end = walk::<LogError>(&reader, 0, self.config.max_frame_len(), |segment| {
            match segment {
                Segment::Record { record, .. } => inspection.records.push(record),
                Segment::Damaged { start, end, stop } => {
                    let span = Span { start, end };
                    inspection.first_damage.get_or_insert(start);
                    let finding = match stop.kind {
                        StopKind::ChecksumMismatch { record_id, .. } => Finding::ChecksumMismatch {
                            record_id,
                            span,
                            quarantined: None,
                        },
                        StopKind::CorruptFrame { reason } => Finding::MidStreamCorruption {
                            span,
                            reason,
                            quarantined: None,
                        },
                        StopKind::Truncated => Finding::MidStreamCorruption {
                            span,
                            reason: "frame length overruns the next valid frame".to_string(),
                            quarantined: None,
                        },
                    };
                    inspection.damaged.push((span, finding));
                }
                Segment::PartialTail { start, end } => {
                    inspection.partial = Some(Span { start, end });
                }
            }
            Ok(())
        })?;
        inspection.end = end;
        inspection.file_len = reader.file_len()?;
        Ok(inspection)
    }

    fn report(
        &self,
        generation: u64,
        inspection: Inspection,
        tail_finding: Option<Finding>,
    ) -> Result<ScanReport, LogError> {
        let mut findings = Vec::new();
        for (span, finding) in inspection.damaged {
            let quarantined = if self.config.quarantine {
                Some(self.quarantine(generation, span)?)
            } else {
                None
            };
            tracing::warn!(
                generation,
                start = span.start,
                end = span.end,
                finding = ?finding,
                "damaged span in log tail"
            );
            findings.push(with_quarantine(finding, quarantined));
        }
        findings.extend(tail_finding);

        let valid_prefix_len = inspection
            .first_damage
            .or(inspection.partial.map(|p| p.start))
            .unwrap_or(inspection.end);
        Ok(ScanReport {
            generation,
            valid_prefix_len,
            file_len: inspection.file_len,
            records: inspection.records.len() as u64,
            findings,
        })
    }

    /// Copy a damaged span to `quarantine/log.<gen>.<start>-<end>.bin`
    fn quarantine(&self, generation: u64, span: Span) -> Result<PathBuf, LogError> {
        let path = self.dir.quarantine_dir().join(format!(
            "log.{:08}.{}-{}.bin",
            generation, span.start, span.end
        ));
        let bytes = read_span(&self.tail_reader(generation), span.start, span.end)?;
        write_atomic(&path, &bytes)?;
        Ok(path)
    }
}

fn with_quarantine(finding: Finding, path: Option<PathBuf>) -> Finding {
    match finding {
        Finding::MidStreamCorruption { span, reason, .. } => Finding::MidStreamCorruption {
            span,
            reason,
            quarantined: path,
        },
        Finding::ChecksumMismatch {
            record_id, span, ..
        } => Finding::ChecksumMismatch {
            record_id,
            span,
            quarantined: path,
        },
        other => other,
    }
}

#[cfg(test)]
#[path = "guard_tests.rs"]
mod tests;
