// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log tuning knobs shared by writers, guards and compaction

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound on a single payload (16 MiB)
pub const DEFAULT_MAX_PAYLOAD_LEN: usize = 16 * 1024 * 1024;

/// Log configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// How long to wait for the log lock before giving up
    #[serde(with = "humantime_serde")]
    pub lock_timeout: Duration,
    /// How often to retry a busy lock
    #[serde(with = "humantime_serde")]
    pub lock_poll_interval: Duration,
    /// Largest payload accepted by `append`
    pub max_payload_len: usize,
    /// Copy damaged spans into `quarantine/` when scanning
    pub quarantine: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
            lock_poll_interval: Duration::from_millis(10),
            max_payload_len: DEFAULT_MAX_PAYLOAD_LEN,
            quarantine: true,
        }
    }
}

impl LogConfig {
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_lock_poll_interval(mut self, interval: Duration) -> Self {
        self.lock_poll_interval = interval;
        self
    }

    pub fn with_max_payload_len(mut self, len: usize) -> Self {
        self.max_payload_len = len;
        self
    }

    pub fn with_quarantine(mut self, quarantine: bool) -> Self {
        self.quarantine = quarantine;
        self
    }

    /// Largest frame body the decoder will accept for this configuration
    pub fn max_frame_len(&self) -> usize {
        crate::frame::max_body_len(self.max_payload_len)
    }
}
