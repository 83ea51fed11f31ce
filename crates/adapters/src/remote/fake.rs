// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake remote replica for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{DamagedObject, Fetched, PutSummary, RemoteError, RemoteReplica};
use async_trait::async_trait;
use fleetlog_core::{Checksum, Record, RecordId, Watermark};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Recorded remote call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    FetchAfter { after: Watermark },
    Put { count: usize },
    Acknowledge { mark: Watermark },
    Acknowledged,
}

#[derive(Default)]
struct FakeState {
    objects: BTreeMap<(RecordId, Checksum), Record>,
    damaged: Vec<DamagedObject>,
    acknowledged: Watermark,
    calls: Vec<RemoteCall>,
    transient_failures: usize,
    permanent_failure: Option<String>,
    latency: Option<Duration>,
}

/// In-memory remote with injectable failures
#[derive(Clone)]
pub struct FakeRemote {
    name: String,
    state: Arc<Mutex<FakeState>>,
}

impl Default for FakeRemote {
    fn default() -> Self {
        Self::new("fake")
    }
}

impl FakeRemote {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(FakeState::default())),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.state().calls.clone()
    }

    /// Every stored record, ordered by identity then checksum
    pub fn records(&self) -> Vec<Record> {
        self.state().objects.values().cloned().collect()
    }

    /// Store a record directly, as if another node had pushed it
    pub fn insert(&self, record: Record) {
        self.state()
            .objects
            .insert((record.id(), record.checksum), record);
    }

    /// Report an unreadable object on every fetch that reaches its sequence
    pub fn insert_damaged(&self, object: DamagedObject) {
        self.state().damaged.push(object);
    }

    /// Fail the next `n` calls with `Unavailable`
    pub fn fail_next(&self, n: usize) {
        self.state().transient_failures = n;
    }

    /// Fail every call with `Rejected` until cleared
    pub fn set_permanent_failure(&self, reason: Option<&str>) {
        self.state().permanent_failure = reason.map(str::to_string);
    }

    /// Delay every call, for exercising request timeouts
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.state().latency = latency;
    }

    /// Record the call and apply injected latency and failures
    async fn begin(&self, call: RemoteCall) -> Result<(), RemoteError> {
        let latency = {
            let mut state = self.state();
            state.calls.push(call);
            state.latency
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let mut state = self.state();
        if let Some(reason) = &state.permanent_failure {
            return Err(RemoteError::Rejected(reason.clone()));
        }
        if state.transient_failures > 0 {
            state.transient_failures -= 1;
            return Err(RemoteError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteReplica for FakeRemote {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_after(&self, after: &Watermark) -> Result<Fetched, RemoteError> {
        self.begin(RemoteCall::FetchAfter {
            after: after.clone(),
        })
        .await?;
        let state = self.state();
        Ok(Fetched {
            records: state
                .objects
                .values()
                .filter(|r| !after.covers_record(r))
                .cloned()
                .collect(),
            damaged: state
                .damaged
                .iter()
                .filter(|d| d.id.as_ref().map_or(true, |id| !after.covers(id)))
                .cloned()
                .collect(),
        })
    }

    async fn put(&self, records: &[Record]) -> Result<PutSummary, RemoteError> {
        self.begin(RemoteCall::Put {
            count: records.len(),
        })
        .await?;
        if let Some(bad) = records.iter().find(|r| !r.verify()) {
            return Err(RemoteError::Rejected(format!(
                "record {} does not verify",
                bad.id()
            )));
        }
        let mut state = self.state();
        let mut summary = PutSummary::default();
        for record in records {
            let key = (record.id(), record.checksum);
            if state.objects.contains_key(&key) {
                summary.already_present += 1;
            } else {
                state.objects.insert(key, record.clone());
                summary.stored += 1;
            }
        }
        Ok(summary)
    }

    async fn acknowledge(&self, mark: &Watermark) -> Result<(), RemoteError> {
        self.begin(RemoteCall::Acknowledge { mark: mark.clone() })
            .await?;
        let mut state = self.state();
        state.acknowledged = state.acknowledged.join(mark);
        Ok(())
    }

    async fn acknowledged(&self) -> Result<Watermark, RemoteError> {
        self.begin(RemoteCall::Acknowledged).await?;
        Ok(self.state().acknowledged.clone())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
