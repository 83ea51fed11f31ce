// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read command

use super::existing_log;
use crate::output::{self, OutputFormat};
use clap::Args;
use fleetlog_core::storage::StopKind;
use fleetlog_core::{Checksum, LogConfig, Record, RecordId};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Args)]
pub struct ReadArgs {
    /// Log directory
    #[arg(long)]
    pub dir: PathBuf,

    /// Byte offset to resume from, as reported by an earlier read
    #[arg(long, default_value_t = 0)]
    pub from: u64,
}

#[derive(Serialize)]
struct RecordLine {
    id: RecordId,
    logical_clock: u64,
    wall_time_micros: u64,
    checksum: Checksum,
    payload: String,
}

impl From<&Record> for RecordLine {
    fn from(record: &Record) -> Self {
        Self {
            id: record.id(),
            logical_clock: record.logical_clock,
            wall_time_micros: record.wall_time_micros,
            checksum: record.checksum,
            payload: output::payload_text(&record.payload),
        }
    }
}

impl fmt::Display for RecordLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<24} clock={:<6} {} {}",
            self.id.to_string(),
            self.logical_clock,
            self.checksum.short(),
            self.payload
        )
    }
}

/// Print every record up to the first bad frame; takes no lock
pub fn run(args: ReadArgs, config: LogConfig, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let log = existing_log(&args.dir)?;
    let reader = log.reader()?.with_max_body_len(config.max_frame_len());

    let mut iter = reader.read_from(args.from)?;
    let mut lines = Vec::new();
    for record in iter.by_ref() {
        lines.push(RecordLine::from(&record?));
    }
    output::print_lines(&lines, format);

    match iter.stop() {
        None => eprintln!(
            "read {} record(s); end of log at offset {}",
            lines.len(),
            iter.position()
        ),
        Some(stop) => {
            let why = match &stop.kind {
                StopKind::Truncated => "partial frame at end of file".to_string(),
                StopKind::CorruptFrame { reason } => format!("corrupt frame: {}", reason),
                StopKind::ChecksumMismatch { record_id, .. } => {
                    format!("checksum mismatch for {}", record_id)
                }
            };
            eprintln!(
                "read {} record(s); stopped at offset {}: {}",
                lines.len(),
                stop.offset,
                why
            );
            eprintln!(
                "resume with --from {}; run `fleetlog scan` for the full picture",
                iter.position()
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}
