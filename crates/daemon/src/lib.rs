// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fleetlog sync daemon
//!
//! Pushes local records to a remote replica, pulls remote records back
//! through the merge engine, and keeps replica watermarks current.

pub mod config;
pub mod lifecycle;
pub mod sync;

pub use config::{ConfigError, DaemonConfig, LogSection, RemoteSection, SyncConfig};
pub use lifecycle::{DaemonPaths, DaemonState, LifecycleError};
pub use sync::{CycleReport, SyncDaemon, SyncError, SyncStage};
