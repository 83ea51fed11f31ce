// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fleetlog-core: crash-safe append log for occasionally connected nodes
//!
//! This crate provides:
//! - Self-validating records and their on-disk frame encoding
//! - A locked, fsync-ordered single-file writer shared by many processes
//! - Corruption scanning, quarantine and rebuild
//! - Snapshot compaction that respects replica progress
//! - A commutative, idempotent merge of logs from many replicas

pub mod clock;
pub mod config;
pub mod error;
pub mod frame;
pub mod id;
pub mod merge;
pub mod record;
pub mod replica;
pub mod storage;
pub mod watermark;

pub use clock::{Clock, FakeClock, LamportClock, SystemClock};
pub use config::LogConfig;
pub use error::LogError;
pub use id::{IdGen, OriginId, RecordId, SequentialIdGen, UuidIdGen};
pub use merge::{merge, merge_files, ForkDetected, MergeFilesOutcome, MergeOutcome};
pub use record::{Checksum, Record};
pub use replica::{ReplicaRegistry, ReplicaState};
pub use storage::{
    compact, replay, CommitSummary, CompactionOutcome, CompactionPolicy, CorruptionGuard,
    Finding, Fold, HolderRecord, LogDir, LogReader, LogWriter, RebuildSummary, ScanReport, Span,
};
pub use watermark::Watermark;
