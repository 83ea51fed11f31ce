// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI command implementations

pub mod append;
pub mod merge;
pub mod read;
pub mod repair;
pub mod scan;
pub mod status;

use fleetlog_core::LogDir;
use std::path::Path;

/// Handle on a log that must already exist; inspection never creates one
pub(crate) fn existing_log(dir: &Path) -> anyhow::Result<LogDir> {
    let log = LogDir::at(dir);
    if !log.current_path().exists() {
        anyhow::bail!("no log at {}", dir.display());
    }
    Ok(log)
}
