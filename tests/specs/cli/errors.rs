//! CLI error specs
//!
//! Verify failures are reported with a message and a non-zero exit.

use crate::prelude::*;

#[test]
fn unknown_subcommand_fails() {
    let temp = Project::empty();

    temp.fleetlog()
        .args(&["frobnicate"])
        .fails()
        .stderr_has("unrecognized subcommand");
}

#[test]
fn append_requires_an_origin() {
    let temp = Project::empty();

    temp.fleetlog()
        .args(&["append", "--dir", &temp.log_arg(), "hello"])
        .fails()
        .stderr_has("--origin");
}

#[test]
fn invalid_origin_is_explained() {
    let temp = Project::empty();

    temp.fleetlog()
        .args(&["append", "--dir", &temp.log_arg(), "--origin", "../evil", "x"])
        .fails()
        .stderr_has("error: invalid origin id")
        .stderr_has("[A-Za-z0-9._-]");
}

#[test]
fn read_of_missing_log_fails_without_creating_it() {
    let temp = Project::empty();

    temp.fleetlog()
        .args(&["read", "--dir", &temp.log_arg()])
        .fails()
        .stderr_has("no log at");
    assert!(!temp.log().exists());
}

#[test]
fn merge_of_missing_input_fails() {
    let temp = Project::empty();
    let out = temp.path().join("merged.log");

    temp.fleetlog()
        .args(&["merge", "--out", out.to_str().unwrap(), "nope.log"])
        .fails()
        .stderr_has("input not found: nope.log");
    assert!(!out.exists());
}

#[test]
fn busy_log_times_out_with_holder_details() {
    use fleetlog_core::storage::lock::try_acquire;
    use fleetlog_core::{SystemClock, UuidIdGen};

    let temp = Project::empty();
    temp.append("node-a", &["one"]);
    let lock_path = LogDir::at(temp.log()).lock_path();
    let _held = try_acquire(&lock_path, &SystemClock, &UuidIdGen)
        .unwrap()
        .unwrap();

    temp.fleetlog()
        .args(&[
            "--lock-timeout",
            "100ms",
            "append",
            "--dir",
            &temp.log_arg(),
            "--origin",
            "node-a",
            "two",
        ])
        .fails()
        .stderr_has("error: log is busy")
        .stderr_has(&format!("held by pid {}", std::process::id()));
}

#[test]
fn bad_lock_timeout_is_rejected() {
    let temp = Project::empty();

    temp.fleetlog()
        .args(&["--lock-timeout", "soon", "status", "--dir", &temp.log_arg()])
        .fails()
        .stderr_has("--lock-timeout");
}
