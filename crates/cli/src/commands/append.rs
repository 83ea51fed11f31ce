// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append command

use crate::output::{self, OutputFormat};
use anyhow::Context;
use clap::Args;
use fleetlog_core::{Checksum, LogConfig, LogWriter, OriginId, RecordId};
use serde::Serialize;
use std::fmt;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Args)]
pub struct AppendArgs {
    /// Log directory (created if missing)
    #[arg(long)]
    pub dir: PathBuf,

    /// Origin id of this writer
    #[arg(long)]
    pub origin: String,

    /// Payload text; omit or pass `-` to read stdin
    pub data: Option<String>,
}

#[derive(Serialize)]
struct Appended {
    id: RecordId,
    logical_clock: u64,
    checksum: Checksum,
}

impl fmt::Display for Appended {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.checksum)
    }
}

pub fn run(args: AppendArgs, config: LogConfig, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let origin = OriginId::new(args.origin)?;
    let payload = match args.data.as_deref() {
        None | Some("-") => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("reading payload from stdin")?;
            buf
        }
        Some(text) => text.as_bytes().to_vec(),
    };

    let mut writer = LogWriter::open(&args.dir, origin, config)?;
    let record = writer.append(payload)?;

    output::print(
        &Appended {
            id: record.id(),
            logical_clock: record.logical_clock,
            checksum: record.checksum,
        },
        format,
    );
    Ok(ExitCode::SUCCESS)
}
