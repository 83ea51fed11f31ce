// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sync daemon: one cycle pushes the local delta, pulls the remote delta,
//! merges, and commits.
//!
//! Local reads take no lock. Only the commit of pulled records goes through
//! the writer, on the blocking pool, so local producers are never waiting on
//! the network. A failed cycle leaves the local log as it was; watermark
//! advances made before the failure describe work that really completed.

use crate::config::SyncConfig;
use fleetlog_adapters::{DamagedObject, Fetched, RemoteError, RemoteReplica};
use fleetlog_core::{
    merge, Checksum, Clock, CorruptionGuard, ForkDetected, LogConfig, LogError, LogWriter,
    OriginId, Record, RecordId, ReplicaRegistry, ReplicaState, SystemClock, Watermark,
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Remote request a cycle was performing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStage {
    Push,
    Fetch,
    Acknowledge,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncStage::Push => "push",
            SyncStage::Fetch => "fetch",
            SyncStage::Acknowledge => "acknowledge",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    /// Remote request failed permanently or exhausted its retries
    #[error("sync {stage} failed after {attempts} attempt(s): {last_error}")]
    SyncFailure {
        stage: SyncStage,
        attempts: u32,
        #[source]
        last_error: RemoteError,
    },
    #[error(transparent)]
    Log(#[from] LogError),
    #[error("background task failed: {0}")]
    Join(String),
}

/// What one sync cycle did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Local records newly stored on the remote
    pub pushed: usize,
    /// Records fetched from the remote
    pub pulled: usize,
    /// Pulled records appended to the local log
    pub committed: usize,
    /// Pulled records the local log already held
    pub duplicates: usize,
    pub forks: Vec<ForkDetected>,
    /// Pulled records that failed verification
    pub rejected: usize,
    /// Remote objects skipped because they could not be read
    pub damaged: usize,
}

/// Syncs one local log with one remote replica
pub struct SyncDaemon<R: RemoteReplica> {
    remote: R,
    config: SyncConfig,
    guard: Arc<CorruptionGuard>,
    registry: Arc<ReplicaRegistry>,
    writer: Arc<Mutex<LogWriter>>,
}

impl<R: RemoteReplica> SyncDaemon<R> {
    pub fn new(
        dir: &Path,
        origin: OriginId,
        log_config: LogConfig,
        config: SyncConfig,
        remote: R,
    ) -> Result<Self, SyncError> {
        let writer = LogWriter::open(dir, origin, log_config.clone())?;
        let registry = ReplicaRegistry::new(writer.dir());
        // Validates the replica name before the first cycle
        registry.load(remote.name())?;
        let guard = CorruptionGuard::new(dir, log_config)?;
        Ok(Self {
            remote,
            config,
            guard: Arc::new(guard),
            registry: Arc::new(registry),
            writer: Arc::new(Mutex::new(writer)),
        })
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Push, pull, merge and commit once
    pub async fn run_cycle(&self) -> Result<CycleReport, SyncError> {
        let name = self.remote.name().to_string();
        let mut report = CycleReport::default();

        // Point-in-time local read; concurrent appends show up next cycle
        let (mut state, local) = {
            let guard = Arc::clone(&self.guard);
            let registry = Arc::clone(&self.registry);
            let name = name.clone();
            blocking(move || Ok((registry.load(&name)?, guard.salvage()?))).await?
        };

        let delta: Vec<Record> = local
            .iter()
            .filter(|r| !state.pushed.covers_record(r))
            .cloned()
            .collect();
        if !delta.is_empty() {
            let remote = &self.remote;
            let records = &delta;
            let summary = self
                .retry(SyncStage::Push, move || remote.put(records))
                .await?;
            report.pushed = summary.stored;
            for record in &delta {
                state.pushed.observe(record);
            }
            state = self.save(state).await?;
        }

        let Fetched {
            records: fetched,
            damaged,
        } = {
            let remote = &self.remote;
            let after = &state.pulled;
            self.retry(SyncStage::Fetch, move || remote.fetch_after(after))
                .await?
        };
        report.pulled = fetched.len();
        report.damaged = damaged.len();

        let local_keys: HashSet<(RecordId, Checksum)> =
            local.iter().map(|r| (r.id(), r.checksum)).collect();
        let outcome = merge([local, fetched.clone()]);
        let incoming: Vec<Record> = outcome
            .records
            .into_iter()
            .filter(|r| !local_keys.contains(&(r.id(), r.checksum)))
            .collect();
        report.duplicates = fetched.len().saturating_sub(incoming.len() + outcome.rejected);
        report.rejected = outcome.rejected;
        report.forks = outcome.forks;
        if !incoming.is_empty() {
            let writer = Arc::clone(&self.writer);
            let summary = blocking(move || {
                writer
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .commit_merged(&incoming)
            })
            .await?;
            report.committed = summary.appended;
            report.duplicates += summary.duplicates;
            report.rejected += summary.rejected;
            for fork in summary.forked {
                match report.forks.iter_mut().find(|f| f.id == fork.id) {
                    Some(known) => known.checksums = fork.checksums,
                    None => report.forks.push(fork),
                }
            }
        }

        advance_pulled(&mut state.pulled, &fetched, &damaged);
        state.exchanged = state.exchanged.join(&state.pushed).join(&state.pulled);
        state.last_sync_micros = Some(SystemClock.wall_micros());
        let state = self.save(state).await?;

        let remote = &self.remote;
        let exchanged = &state.exchanged;
        self.retry(SyncStage::Acknowledge, move || remote.acknowledge(exchanged))
            .await?;

        for fork in &report.forks {
            warn!(
                id = %fork.id,
                versions = fork.checksums.len(),
                "fork present after sync; both versions kept"
            );
        }
        Ok(report)
    }

    /// Run cycles every `interval` until `shutdown` flips to true
    ///
    /// An in-flight cycle is abandoned at its next await point. Remote puts
    /// are idempotent and local commits finish on the blocking pool, so the
    /// next start simply repeats the unfinished work.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }
            tokio::select! {
                result = self.run_cycle() => log_cycle(self.remote.name(), &result),
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(remote = self.remote.name(), "abandoning sync cycle for shutdown");
                        break;
                    }
                }
            }
        }
        info!(remote = self.remote.name(), "sync loop stopped");
    }

    /// Call `op` until it succeeds, fails permanently or runs out of attempts
    async fn retry<T, F, Fut>(&self, stage: SyncStage, mut op: F) -> Result<T, SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let mut backoff = self.config.initial_backoff;
        let mut attempts = 0;
        loop {
            attempts += 1;
            let result = match tokio::time::timeout(self.config.request_timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(RemoteError::Timeout(self.config.request_timeout)),
            };
            let error = match result {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };
            if !error.is_transient() || attempts >= self.config.max_attempts {
                return Err(SyncError::SyncFailure {
                    stage,
                    attempts,
                    last_error: error,
                });
            }
            warn!(
                %stage,
                attempts,
                backoff_ms = backoff.as_millis() as u64,
                error = %error,
                "remote request failed; retrying"
            );
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(self.config.max_backoff);
        }
    }

    async fn save(&self, state: ReplicaState) -> Result<ReplicaState, SyncError> {
        let registry = Arc::clone(&self.registry);
        blocking(move || registry.save(&state)).await
    }
}

/// Advance `pulled` over fetched records the local side now holds
///
/// Records that fail verification and damaged objects are never committed,
/// so per origin the mark stops below the lowest such sequence and the next
/// fetch asks for them again.
fn advance_pulled(pulled: &mut Watermark, fetched: &[Record], damaged: &[DamagedObject]) {
    let unverified = fetched.iter().filter(|r| !r.verify()).map(Record::id);
    let unreadable = damaged.iter().filter_map(|d| d.id.clone());
    let mut lowest_missing: HashMap<OriginId, u64> = HashMap::new();
    for id in unverified.chain(unreadable) {
        warn!(%id, "pulled record not held locally; holding the pull mark below it");
        let low = lowest_missing.entry(id.origin).or_insert(id.sequence);
        *low = (*low).min(id.sequence);
    }
    for record in fetched {
        let below_missing = lowest_missing
            .get(&record.origin_id)
            .map_or(true, |low| record.sequence < *low);
        if below_missing && record.verify() {
            pulled.observe(record);
        }
    }
}

/// Run log work on the blocking pool
async fn blocking<T, F>(f: F) -> Result<T, SyncError>
where
    F: FnOnce() -> Result<T, LogError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SyncError::Join(e.to_string()))?
        .map_err(SyncError::Log)
}

fn log_cycle(remote: &str, result: &Result<CycleReport, SyncError>) {
    if let Ok(report) = result {
        if !report.forks.is_empty() {
            let forks = serde_json::to_string(&report.forks).unwrap_or_default();
            warn!(remote, %forks, "pulled records fork local ones; both versions kept");
        }
    }
    match result {
        Ok(report) => info!(
            remote,
            pushed = report.pushed,
            pulled = report.pulled,
            committed = report.committed,
            duplicates = report.duplicates,
            forks = report.forks.len(),
            rejected = report.rejected,
            damaged = report.damaged,
            "sync cycle complete"
        ),
        Err(e) => warn!(remote, error = %e, "sync cycle failed; retrying next tick"),
    }
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
