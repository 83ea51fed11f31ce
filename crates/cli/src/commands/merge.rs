// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Merge command

use crate::output::{self, OutputFormat};
use clap::Args;
use fleetlog_core::{merge_files, LogConfig, MergeFilesOutcome};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Args)]
pub struct MergeArgs {
    /// Where to write the merged frame file (replaced atomically)
    #[arg(long)]
    pub out: PathBuf,

    /// Frame files or log directories to merge
    #[arg(required = true, num_args = 1..)]
    pub inputs: Vec<PathBuf>,
}

#[derive(Serialize)]
#[serde(transparent)]
struct Merged(MergeFilesOutcome);

impl fmt::Display for Merged {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.0;
        write!(
            f,
            "wrote {} record(s) to {} ({} duplicate(s) dropped, {} rejected)",
            m.records,
            m.output.display(),
            m.duplicates_dropped,
            m.rejected
        )?;
        for input in &m.salvaged_inputs {
            write!(f, "\nsalvaged damaged input {}", input.display())?;
        }
        for fork in &m.forks {
            let versions: Vec<String> = fork.checksums.iter().map(|c| c.short()).collect();
            write!(f, "\nfork {}: {}", fork.id, versions.join(", "))?;
        }
        Ok(())
    }
}

pub fn run(args: MergeArgs, config: LogConfig, format: OutputFormat) -> anyhow::Result<ExitCode> {
    if let Some(missing) = args.inputs.iter().find(|p| !p.exists()) {
        anyhow::bail!("input not found: {}", missing.display());
    }
    tracing::debug!(inputs = args.inputs.len(), out = %args.out.display(), "merging");
    let outcome = merge_files(&args.inputs, &args.out, config.max_frame_len())?;
    output::print(&Merged(outcome), format);
    Ok(ExitCode::SUCCESS)
}
