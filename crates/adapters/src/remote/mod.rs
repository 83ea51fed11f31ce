// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote replica protocol
//!
//! A remote replica supports two exchanges: "records after watermark W" and
//! "acknowledge watermark W". Records are stored with put-if-absent so the
//! same delta can be pushed any number of times.

mod dir;

pub use dir::DirRemote;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeRemote, RemoteCall};

use async_trait::async_trait;
use fleetlog_core::{Record, RecordId, Watermark};
use std::time::Duration;
use thiserror::Error;

/// Errors from remote replica operations
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote unavailable: {0}")]
    Unavailable(String),
    #[error("remote request timed out after {0:?}")]
    Timeout(Duration),
    #[error("remote IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Remote metadata that cannot be parsed
    #[error("corrupt remote object {object}: {reason}")]
    Corrupt { object: String, reason: String },
    #[error("remote rejected request: {0}")]
    Rejected(String),
}

impl RemoteError {
    /// Whether the same request may succeed if retried
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RemoteError::Unavailable(_) | RemoteError::Timeout(_) | RemoteError::Io(_)
        )
    }
}

/// Result of a put
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PutSummary {
    /// Records newly stored by this call
    pub stored: usize,
    /// Records the remote already held
    pub already_present: usize,
}

/// A stored object that could not be read back as a valid record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DamagedObject {
    pub object: String,
    /// Identity taken from the object's name, when the name parses
    pub id: Option<RecordId>,
    pub reason: String,
}

/// Result of a fetch
///
/// Damaged objects are skipped and listed rather than failing the fetch, so
/// one bad object never hides the valid records around it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fetched {
    pub records: Vec<Record>,
    pub damaged: Vec<DamagedObject>,
}

/// A durable copy of the log somewhere else
#[async_trait]
pub trait RemoteReplica: Clone + Send + Sync + 'static {
    /// Registry name for this replica
    fn name(&self) -> &str;

    /// Every stored record whose sequence is above `after` for its origin
    async fn fetch_after(&self, after: &Watermark) -> Result<Fetched, RemoteError>;

    /// Store records that are not already present
    async fn put(&self, records: &[Record]) -> Result<PutSummary, RemoteError>;

    /// Record that the caller holds everything up to `mark`
    async fn acknowledge(&self, mark: &Watermark) -> Result<(), RemoteError>;

    /// Join of every acknowledged watermark
    async fn acknowledged(&self) -> Result<Watermark, RemoteError>;
}
