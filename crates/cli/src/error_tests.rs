// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fleetlog_core::HolderRecord;
use std::path::PathBuf;
use std::time::Duration;

#[test]
fn test_error_display() {
    let err = CliError::new("Something went wrong")
        .with_context("First context")
        .with_context("Second context")
        .with_suggestion("Try this")
        .with_suggestion("Or this");

    let output = format!("{}", err);
    assert!(output.contains("error: Something went wrong"));
    assert!(output.contains("-> First context"));
    assert!(output.contains("-> Second context"));
    assert!(output.contains("1. Try this"));
    assert!(output.contains("2. Or this"));
}

#[test]
fn lock_timeout_names_the_holder() {
    let err = anyhow::Error::new(LogError::LockTimeout {
        path: PathBuf::from("/var/log/fleet/log.lock"),
        waited: Duration::from_millis(250),
        holder: Some(HolderRecord {
            pid: 4242,
            host: "edge-7".to_string(),
            token: "t-1".to_string(),
            acquired_at_micros: 0,
        }),
        holder_alive: None,
    });

    let output = describe(&err).to_string();
    assert!(output.contains("250ms"));
    assert!(output.contains("pid 4242 on edge-7"));
    assert!(output.contains("--lock-timeout"));
}

#[test]
fn dead_holder_is_reported_as_reclaimable() {
    let err = anyhow::Error::new(LogError::LockTimeout {
        path: PathBuf::from("log.lock"),
        waited: Duration::from_millis(10),
        holder: None,
        holder_alive: Some(false),
    });

    assert!(describe(&err).to_string().contains("reclaimed"));
}

#[test]
fn context_chain_is_kept_for_other_errors() {
    let err = anyhow::anyhow!("disk on fire").context("reading input");

    let output = describe(&err).to_string();
    assert!(output.contains("error: reading input"));
    assert!(output.contains("-> disk on fire"));
}
