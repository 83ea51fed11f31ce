// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy for log operations
//!
//! Corruption and fork findings are not errors: they are returned as
//! structured reports (see `storage::guard` and `merge`). Errors here mean an
//! operation did not complete.

use crate::storage::lock::HolderRecord;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogError {
    /// The log lock was not acquirable within the configured bound.
    /// Not data loss: the caller should retry later.
    #[error("lock {} not acquired within {waited:?}", path.display())]
    LockTimeout {
        path: PathBuf,
        waited: Duration,
        holder: Option<HolderRecord>,
        holder_alive: Option<bool>,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid origin id: {0:?}")]
    InvalidOrigin(String),
    #[error("invalid replica name: {0:?}")]
    InvalidReplicaName(String),
    #[error("payload of {len} bytes exceeds limit of {max}")]
    PayloadTooLarge { len: usize, max: usize },
    #[error("invalid generation marker: {0}")]
    InvalidGeneration(String),
    #[error("invalid snapshot: {0}")]
    Snapshot(String),
    #[error("compaction blocked: {damaged_spans} damaged span(s) need operator attention")]
    CompactionBlocked { damaged_spans: usize },
    #[error("validation of {} failed: {reason}", path.display())]
    ValidationFailed { path: PathBuf, reason: String },
}

impl LogError {
    /// Whether retrying the same operation later may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, LogError::LockTimeout { .. } | LogError::Io(_))
    }
}
