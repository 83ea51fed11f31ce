// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fleetlog - append, inspect, repair and merge fleet logs

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use commands::{append, merge, read, repair, scan, status};
use fleetlog_core::LogConfig;
use output::OutputFormat;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "fleetlog",
    version,
    about = "fleetlog - crash-safe append logs that merge across replicas"
)]
struct Cli {
    /// How long to wait for the log lock before giving up (e.g. 500ms, 10s)
    #[arg(
        long,
        global = true,
        value_name = "DURATION",
        default_value = "5s",
        value_parser = humantime::parse_duration
    )]
    lock_timeout: Duration,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Append one record to a log
    Append(append::AppendArgs),
    /// Print the records of a log's current tail
    Read(read::ReadArgs),
    /// Report damage in a log, healing a crashed writer's partial tail
    Scan(scan::ScanArgs),
    /// Rebuild a damaged log from every record that still verifies
    Repair(repair::RepairArgs),
    /// Merge frame files or log directories into one canonical file
    Merge(merge::MergeArgs),
    /// Show generation, tail, snapshot and replica state
    Status(status::StatusArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging();

    let config = LogConfig::default().with_lock_timeout(cli.lock_timeout);
    let format = cli.format;

    let result = match cli.command {
        Commands::Append(args) => append::run(args, config, format),
        Commands::Read(args) => read::run(args, config, format),
        Commands::Scan(args) => scan::run(args, config, format),
        Commands::Repair(args) => repair::run(args, config, format),
        Commands::Merge(args) => merge::run(args, config, format),
        Commands::Status(args) => status::run(args, config, format),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprint!("{}", error::describe(&e));
            ExitCode::FAILURE
        }
    }
}

/// Diagnostics go to stderr so stdout stays machine-readable
fn setup_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
