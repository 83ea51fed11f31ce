// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status command

use super::existing_log;
use crate::output::{self, OutputFormat};
use clap::Args;
use fleetlog_core::storage::lock::read_holder;
use fleetlog_core::storage::snapshot::read_header;
use fleetlog_core::storage::SnapshotHeader;
use fleetlog_core::{HolderRecord, LogConfig, ReplicaRegistry, ReplicaState};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Args)]
pub struct StatusArgs {
    /// Log directory
    #[arg(long)]
    pub dir: PathBuf,
}

#[derive(Serialize)]
struct Status {
    generation: u64,
    tail: PathBuf,
    tail_bytes: u64,
    /// Records in the valid prefix
    tail_records: u64,
    /// Bytes past the valid prefix; `fleetlog scan` explains them
    unvalidated_bytes: u64,
    snapshot: Option<SnapshotHeader>,
    lock_holder: Option<HolderRecord>,
    replicas: Vec<ReplicaState>,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Generation: {}", self.generation)?;
        writeln!(
            f,
            "Tail: {} ({} bytes, {} records)",
            self.tail.display(),
            self.tail_bytes,
            self.tail_records
        )?;
        if self.unvalidated_bytes > 0 {
            writeln!(
                f,
                "  {} byte(s) past the valid prefix; run `fleetlog scan`",
                self.unvalidated_bytes
            )?;
        }
        match &self.snapshot {
            Some(header) => writeln!(
                f,
                "Snapshot: {} records folded up to {} (created {})",
                header.records_folded,
                header.watermark,
                header.created_at.to_rfc3339()
            )?,
            None => writeln!(f, "Snapshot: none")?,
        }
        if let Some(holder) = &self.lock_holder {
            writeln!(f, "Lock: recorded holder pid {} on {}", holder.pid, holder.host)?;
        }
        if self.replicas.is_empty() {
            write!(f, "Replicas: none")
        } else {
            write!(f, "Replicas:")?;
            for replica in &self.replicas {
                write!(
                    f,
                    "\n  {:<16} pushed={} pulled={}",
                    replica.name, replica.pushed, replica.pulled
                )?;
            }
            Ok(())
        }
    }
}

/// Summarize a log without taking its lock
pub fn run(args: StatusArgs, config: LogConfig, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let log = existing_log(&args.dir)?;
    let generation = log.generation()?;
    let reader = log.reader()?.with_max_body_len(config.max_frame_len());
    let validation = reader.validate()?;

    let status = Status {
        generation,
        tail: reader.path().to_path_buf(),
        tail_bytes: validation.file_len,
        tail_records: validation.records,
        unvalidated_bytes: validation.file_len - validation.valid_bytes,
        snapshot: read_header(&log.snapshot_path(generation))?,
        lock_holder: read_holder(&log.lock_path())?,
        replicas: ReplicaRegistry::new(&log).list()?,
    };
    output::print(&status, format);
    Ok(ExitCode::SUCCESS)
}
