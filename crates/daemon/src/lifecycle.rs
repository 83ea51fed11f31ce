// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, shutdown, recovery.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;

use fleetlog_adapters::{DirRemote, TracedRemote};
use fleetlog_core::{CorruptionGuard, Finding, LogDir, LogError};
use fs2::FileExt;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{ConfigError, DaemonConfig};
use crate::sync::{SyncDaemon, SyncError};

/// Remote type used by the daemon binary (wrapped with tracing)
pub type DaemonRemote = TracedRemote<DirRemote>;

/// Files owned by one daemon instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonPaths {
    pub state_dir: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
}

impl DaemonPaths {
    /// Per-log state directory, so one daemon runs per log
    pub fn for_config(config: &DaemonConfig) -> Result<Self, LifecycleError> {
        let state_dir = match &config.state_dir {
            Some(dir) => dir.clone(),
            None => {
                let log_dir = LogDir::open(&config.log.dir)?;
                let canonical = log_dir.path().canonicalize()?;
                state_dir()?.join("logs").join(log_hash(&canonical))
            }
        };
        Ok(Self::in_dir(state_dir))
    }

    pub fn in_dir(state_dir: PathBuf) -> Self {
        Self {
            lock_path: state_dir.join("daemon.pid"),
            log_path: state_dir.join("daemon.log"),
            state_dir,
        }
    }
}

/// Daemon state during operation
pub struct DaemonState {
    pub paths: DaemonPaths,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub sync: SyncDaemon<DaemonRemote>,
    /// When daemon started
    pub start_time: Instant,
}

impl DaemonState {
    /// Shutdown the daemon gracefully
    pub fn shutdown(&mut self) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");

        if self.paths.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.paths.lock_path) {
                warn!("Failed to remove PID file: {}", e);
            }
        }

        // Lock file is released automatically when self.lock_file is dropped
        info!(
            uptime_secs = self.start_time.elapsed().as_secs(),
            "Daemon shutdown complete"
        );
        Ok(())
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Log error: {0}")]
    Log(#[from] LogError),

    #[error("Sync setup error: {0}")]
    Sync(#[from] SyncError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Start the daemon
pub fn startup(config: &DaemonConfig, paths: &DaemonPaths) -> Result<DaemonState, LifecycleError> {
    std::fs::create_dir_all(&paths.state_dir)?;

    // Acquire lock file FIRST - prevents races
    let lock_file = acquire_pid_lock(&paths.lock_path)?;

    match startup_inner(config) {
        Ok(sync) => {
            info!(
                log_dir = %config.log.dir.display(),
                remote = %config.remote.name,
                "Daemon started"
            );
            Ok(DaemonState {
                paths: paths.clone(),
                lock_file,
                sync,
                start_time: Instant::now(),
            })
        }
        Err(e) => {
            // Only remove the PID file this process wrote
            let _ = std::fs::remove_file(&paths.lock_path);
            Err(e)
        }
    }
}

fn acquire_pid_lock(path: &Path) -> Result<File, LifecycleError> {
    use std::io::Write;

    let file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)?;
    file.try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;

    let mut file = file;
    file.set_len(0)?;
    writeln!(file, "{}", std::process::id())?;
    file.sync_data()?;
    Ok(file)
}

/// Inner startup logic; the PID file is removed if this fails
fn startup_inner(config: &DaemonConfig) -> Result<SyncDaemon<DaemonRemote>, LifecycleError> {
    let origin = config.origin()?;

    // Heal a crashed writer's tail and surface damage before syncing
    let guard = CorruptionGuard::new(&config.log.dir, config.log.config.clone())?;
    reconcile_log(&guard)?;

    let remote = TracedRemote::new(
        DirRemote::new(config.remote.name.clone(), config.remote.dir.clone())
            .with_max_body_len(config.log.config.max_frame_len()),
    );
    Ok(SyncDaemon::new(
        &config.log.dir,
        origin,
        config.log.config.clone(),
        config.sync.clone(),
        remote,
    )?)
}

/// Scan the log once at startup and log what was found
fn reconcile_log(guard: &CorruptionGuard) -> Result<(), LifecycleError> {
    let report = guard.scan()?;
    for finding in &report.findings {
        match finding {
            Finding::RecoveredTruncation {
                offset,
                bytes_dropped,
            } => info!(offset, bytes_dropped, "healed partial tail left by a crashed writer"),
            Finding::PendingTail { offset, bytes } => {
                info!(offset, bytes, "tail write in progress by another process")
            }
            other => warn!(finding = ?other, "log damage needs operator attention"),
        }
    }
    if report.needs_attention() {
        warn!(
            damaged_spans = report.interior_damage(),
            "syncing salvageable records only; run `fleetlog repair` to rebuild the log"
        );
    }
    Ok(())
}

/// Get the state directory for fleetlogd
fn state_dir() -> Result<PathBuf, LifecycleError> {
    // Use XDG_STATE_HOME or default to ~/.local/state
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("fleetlog"));
    }

    let home = dirs::home_dir().ok_or(LifecycleError::NoStateDir)?;
    Ok(home.join(".local/state/fleetlog"))
}

/// Stable short name for a log directory
fn log_hash(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    let result = hasher.finalize();
    // Take first 16 chars of hex digest
    result[..8].iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
