// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Repair command

use super::existing_log;
use crate::output::{self, OutputFormat};
use clap::Args;
use fleetlog_core::{CorruptionGuard, LogConfig, RebuildSummary};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Args)]
pub struct RepairArgs {
    /// Log directory
    #[arg(long)]
    pub dir: PathBuf,
}

#[derive(Serialize)]
#[serde(transparent)]
struct Repaired(RebuildSummary);

impl fmt::Display for Repaired {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.0;
        write!(
            f,
            "rebuilt generation {} -> {}: kept {} record(s), quarantined {} span(s), dropped {} byte(s)",
            s.from_generation, s.to_generation, s.records_kept, s.spans_quarantined, s.bytes_dropped
        )
    }
}

/// Rewrite the log from its verified records; damaged bytes go to quarantine
pub fn run(args: RepairArgs, config: LogConfig, format: OutputFormat) -> anyhow::Result<ExitCode> {
    existing_log(&args.dir)?;
    // Rebuild always keeps a copy of what it drops
    let guard = CorruptionGuard::new(&args.dir, config.with_quarantine(true))?;
    let summary = guard.rebuild()?;
    output::print(&Repaired(summary), format);
    Ok(ExitCode::SUCCESS)
}
