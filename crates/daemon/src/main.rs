// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! fleetlog sync daemon (fleetlogd)
//!
//! Background process that keeps one local log in sync with one remote
//! replica. Usage: `fleetlogd [CONFIG]`.

use std::path::PathBuf;

use fleetlog_daemon::lifecycle::{self, DaemonPaths, LifecycleError};
use fleetlog_daemon::DaemonConfig;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => DaemonConfig::default_path()?,
    };

    // Load configuration
    let config = DaemonConfig::load(&config_path)?;
    let paths = DaemonPaths::for_config(&config)?;

    // Write startup marker to log (before tracing setup, so operators can find it)
    write_startup_marker(&paths)?;

    // Set up logging
    let log_guard = setup_logging(&paths)?;

    info!(
        config = %config_path.display(),
        log_dir = %config.log.dir.display(),
        "Starting fleetlogd"
    );

    // Start daemon
    let mut daemon = match lifecycle::startup(&config, &paths) {
        Ok(d) => d,
        Err(e) => {
            // Write error synchronously (tracing is non-blocking and may not flush in time)
            write_startup_error(&paths, &e);
            error!("Failed to start daemon: {}", e);
            drop(log_guard);
            return Err(e.into());
        }
    };

    // Set up signal handlers
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Signal ready for parent process (e.g., systemd)
    println!("READY");

    let signals = async {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
            _ = sigint.recv() => info!("Received SIGINT, shutting down..."),
        }
        let _ = shutdown_tx.send(true);
    };
    tokio::join!(daemon.sync.run(shutdown_rx), signals);

    daemon.shutdown()?;
    info!("Daemon stopped");
    Ok(())
}

/// Startup marker prefix written to log before anything else.
/// Full format: "--- fleetlogd: starting (pid: 12345) ---"
pub const STARTUP_MARKER_PREFIX: &str = "--- fleetlogd: starting (pid: ";

/// Write startup marker to log file (appends to existing log)
fn write_startup_marker(paths: &DaemonPaths) -> Result<(), LifecycleError> {
    use std::io::Write;

    std::fs::create_dir_all(&paths.state_dir)?;

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.log_path)?;
    writeln!(file, "{}{}) ---", STARTUP_MARKER_PREFIX, std::process::id())?;

    Ok(())
}

/// Write startup error synchronously to log file.
fn write_startup_error(paths: &DaemonPaths, error: &LifecycleError) {
    use std::io::Write;

    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.log_path)
    else {
        return;
    };
    let _ = writeln!(file, "ERROR Failed to start daemon: {}", error);
}

fn setup_logging(
    paths: &DaemonPaths,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let file_name = paths
        .log_path
        .file_name()
        .ok_or(LifecycleError::NoStateDir)?;
    let file_appender = tracing_appender::rolling::never(&paths.state_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Set up subscriber with env filter
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
