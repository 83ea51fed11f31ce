// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scan command

use super::existing_log;
use crate::output::{self, OutputFormat};
use clap::Args;
use fleetlog_core::{CorruptionGuard, Finding, LogConfig, ScanReport};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::process::ExitCode;

/// Exit status when interior damage needs an operator
pub const EXIT_NEEDS_ATTENTION: u8 = 2;

#[derive(Args)]
pub struct ScanArgs {
    /// Log directory
    #[arg(long)]
    pub dir: PathBuf,

    /// Report damage without copying it into quarantine/
    #[arg(long)]
    pub no_quarantine: bool,
}

#[derive(Serialize)]
struct ScanView<'a> {
    #[serde(flatten)]
    report: &'a ScanReport,
    needs_attention: bool,
}

impl fmt::Display for ScanView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.report;
        writeln!(
            f,
            "generation {}: {} record(s), valid prefix {} of {} bytes",
            report.generation, report.records, report.valid_prefix_len, report.file_len
        )?;
        for finding in &report.findings {
            writeln!(f, "  {}", FindingLine(finding))?;
        }
        if self.needs_attention {
            write!(
                f,
                "needs attention: {} damaged span(s); run `fleetlog repair` to rebuild",
                report.interior_damage()
            )
        } else if report.is_clean() {
            write!(f, "clean")
        } else {
            write!(f, "ok")
        }
    }
}

struct FindingLine<'a>(&'a Finding);

impl fmt::Display for FindingLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Finding::RecoveredTruncation {
                offset,
                bytes_dropped,
            } => write!(
                f,
                "recovered truncation at offset {}: dropped {} byte(s) of a partial write",
                offset, bytes_dropped
            ),
            Finding::PendingTail { offset, bytes } => write!(
                f,
                "pending tail at offset {}: {} byte(s) still being written",
                offset, bytes
            ),
            Finding::MidStreamCorruption {
                span,
                reason,
                quarantined,
            } => {
                write!(
                    f,
                    "mid-stream corruption at {}..{}: {}",
                    span.start, span.end, reason
                )?;
                if let Some(path) = quarantined {
                    write!(f, " (copied to {})", path.display())?;
                }
                Ok(())
            }
            Finding::ChecksumMismatch {
                record_id,
                span,
                quarantined,
            } => {
                write!(
                    f,
                    "checksum mismatch for {} at {}..{}",
                    record_id, span.start, span.end
                )?;
                if let Some(path) = quarantined {
                    write!(f, " (copied to {})", path.display())?;
                }
                Ok(())
            }
        }
    }
}

pub fn run(args: ScanArgs, config: LogConfig, format: OutputFormat) -> anyhow::Result<ExitCode> {
    existing_log(&args.dir)?;
    let config = config.with_quarantine(!args.no_quarantine);
    let report = CorruptionGuard::new(&args.dir, config)?.scan()?;

    let needs_attention = report.needs_attention();
    output::print(
        &ScanView {
            report: &report,
            needs_attention,
        },
        format,
    );
    if needs_attention {
        Ok(ExitCode::from(EXIT_NEEDS_ATTENTION))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
