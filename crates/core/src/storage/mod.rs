// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk log: layout, locking, reading, writing, repair and compaction

pub mod compaction;
pub mod fsync;
pub mod guard;
pub mod layout;
pub mod lock;
pub mod reader;
pub mod snapshot;
pub(crate) mod walk;
pub mod writer;

pub use compaction::{compact, replay, CompactionOutcome, CompactionPolicy, Fold};
pub use guard::{CorruptionGuard, Finding, RebuildSummary, ScanReport, Span};
pub use layout::LogDir;
pub use lock::{HolderRecord, LockGuard};
pub use reader::{LogReader, LogValidation, ReadStop, RecordIter, StopKind};
pub use snapshot::{Snapshot, SnapshotHeader};
pub use writer::{CommitSummary, LogWriter};
