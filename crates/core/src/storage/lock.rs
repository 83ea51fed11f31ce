// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exclusive, crash-recoverable log lock
//!
//! Exclusion comes from an advisory `flock` on `log.lock`, which the kernel
//! drops when the holding process dies. The file body records who holds the
//! lock so that waiters can report the holder and check its liveness. The
//! holder clears the body on release; a body left behind belongs to a holder
//! that died, and is reclaimed by the next acquirer.

use crate::clock::Clock;
use crate::config::LogConfig;
use crate::error::LogError;
use crate::id::IdGen;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Identity and liveness token of a lock holder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolderRecord {
    pub pid: u32,
    pub host: String,
    /// Fresh per acquisition; distinguishes holders across pid reuse
    pub token: String,
    pub acquired_at_micros: u64,
}

impl HolderRecord {
    fn for_this_process(token: String, acquired_at_micros: u64) -> Self {
        Self {
            pid: std::process::id(),
            host: local_host(),
            token,
            acquired_at_micros,
        }
    }

    /// Check whether the holder process still exists
    ///
    /// Returns `None` when the holder lives on another host.
    pub fn is_alive(&self) -> Option<bool> {
        if self.host != local_host() {
            return None;
        }
        Some(process_exists(self.pid))
    }
}

/// Held log lock; released on drop
#[derive(Debug)]
pub struct LockGuard {
    file: File,
    path: PathBuf,
    holder: HolderRecord,
}

impl LockGuard {
    pub fn holder(&self) -> &HolderRecord {
        &self.holder
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Clear the holder record and unlock
    pub fn release(self) -> Result<(), LogError> {
        self.clear()?;
        Ok(())
    }

    fn clear(&self) -> std::io::Result<()> {
        self.file.set_len(0)?;
        self.file.sync_data()?;
        self.file.unlock()
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.clear() {
            tracing::debug!(path = %self.path.display(), error = %e, "lock release failed");
        }
    }
}

/// Try once to take the lock
///
/// Returns `Ok(None)` if another holder has it.
pub fn try_acquire<C: Clock, G: IdGen>(
    path: &Path,
    clock: &C,
    ids: &G,
) -> Result<Option<LockGuard>, LogError> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;

    if let Err(e) = file.try_lock_exclusive() {
        if e.kind() == fs2::lock_contended_error().kind() {
            return Ok(None);
        }
        return Err(e.into());
    }

    let holder = HolderRecord::for_this_process(ids.next(), clock.wall_micros());
    if let Some(previous) = read_holder_from(&mut file)? {
        if previous.token != holder.token {
            tracing::warn!(
                path = %path.display(),
                previous_pid = previous.pid,
                previous_host = %previous.host,
                previous_alive = ?previous.is_alive(),
                "reclaiming stale log lock"
            );
        }
    }

    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(&serde_json::to_vec(&holder)?)?;
    file.sync_data()?;

    Ok(Some(LockGuard {
        file,
        path: path.to_path_buf(),
        holder,
    }))
}

/// Take the lock, polling until `config.lock_timeout` elapses
pub fn acquire<C: Clock, G: IdGen>(
    path: &Path,
    config: &LogConfig,
    clock: &C,
    ids: &G,
) -> Result<LockGuard, LogError> {
    let start = clock.now();
    loop {
        if let Some(guard) = try_acquire(path, clock, ids)? {
            return Ok(guard);
        }
        let waited = clock.now().duration_since(start);
        if waited >= config.lock_timeout {
            let holder = read_holder(path).ok().flatten();
            let holder_alive = holder.as_ref().and_then(HolderRecord::is_alive);
            tracing::warn!(
                path = %path.display(),
                waited_ms = waited.as_millis() as u64,
                holder_pid = holder.as_ref().map(|h| h.pid),
                holder_alive = ?holder_alive,
                "log lock timeout"
            );
            return Err(LogError::LockTimeout {
                path: path.to_path_buf(),
                waited,
                holder,
                holder_alive,
            });
        }
        std::thread::sleep(config.lock_poll_interval);
    }
}

/// Read the holder record without taking the lock
pub fn read_holder(path: &Path) -> Result<Option<HolderRecord>, LogError> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    read_holder_from(&mut file)
}

fn read_holder_from(file: &mut File) -> Result<Option<HolderRecord>, LogError> {
    let mut body = String::new();
    file.seek(SeekFrom::Start(0))?;
    file.read_to_string(&mut body)?;
    if body.trim().is_empty() {
        return Ok(None);
    }
    // A torn holder record is as good as none; exclusion comes from flock
    Ok(serde_json::from_str(&body).ok())
}

fn local_host() -> String {
    nix::unistd::gethostname()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_default()
}

fn process_exists(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    match kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
