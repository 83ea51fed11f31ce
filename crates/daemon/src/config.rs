// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration file
//!
//! ```toml
//! [log]
//! dir = "/var/lib/fleetlog/node-a"
//! origin = "node-a"
//! lock_timeout = "5s"
//!
//! [remote]
//! name = "bucket"
//! dir = "/mnt/bucket/fleetlog"
//!
//! [sync]
//! interval = "30s"
//! max_attempts = 5
//! ```

use fleetlog_core::{id, LogConfig, OriginId};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("could not determine config directory")]
    NoConfigDir,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DaemonConfig {
    pub log: LogSection,
    pub remote: RemoteSection,
    #[serde(default)]
    pub sync: SyncConfig,
    /// Where the pid lock and daemon log live; derived from the log dir if unset
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
}

/// The local log this daemon syncs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSection {
    pub dir: PathBuf,
    pub origin: String,
    #[serde(flatten)]
    pub config: LogConfig,
}

/// The remote replica
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteSection {
    /// Registry name; also names `replicas/<name>.json`
    pub name: String,
    /// Root of the directory-backed object store
    pub dir: PathBuf,
}

/// Sync loop timing and retry policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Attempts per remote request before the cycle is skipped
    pub max_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,
    /// Bound on each individual remote request
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            max_attempts: 5,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl DaemonConfig {
    /// `$XDG_CONFIG_HOME/fleetlog/fleetlogd.toml` or the platform equivalent
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(dir.join("fleetlog").join("fleetlogd.toml"))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: DaemonConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn origin(&self) -> Result<OriginId, ConfigError> {
        OriginId::new(self.log.origin.as_str()).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.origin()?;
        if !id::is_valid_name(&self.remote.name) {
            return Err(ConfigError::Invalid(format!(
                "remote name {:?} must be 1-128 chars of [A-Za-z0-9._-]",
                self.remote.name
            )));
        }
        if self.sync.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "sync.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.sync.initial_backoff > self.sync.max_backoff {
            return Err(ConfigError::Invalid(
                "sync.initial_backoff exceeds sync.max_backoff".to_string(),
            ));
        }
        if self.sync.interval.is_zero() || self.sync.request_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "sync.interval and sync.request_timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
