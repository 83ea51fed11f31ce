//! Repair specs
//!
//! Verify an explicit rebuild keeps every verified record and moves the
//! log to a new generation.

use crate::prelude::*;

fn damaged_log() -> Project {
    let temp = Project::empty();
    temp.append("node-a", &["one", "two", "three"]);
    let tail = temp.tail();
    let mut bytes = std::fs::read(&tail).unwrap();
    let first_len = frame::encoded_len(&record("node-a", 1, 1, "one"));
    bytes[first_len - 1] ^= 0xff;
    std::fs::write(&tail, bytes).unwrap();
    temp
}

#[test]
fn repair_rebuilds_from_verified_records() {
    let temp = damaged_log();

    temp.fleetlog()
        .args(&["repair", "--dir", &temp.log_arg()])
        .passes()
        .stdout_has("rebuilt generation 0 -> 1: kept 2 record(s), quarantined 1 span(s)");

    temp.fleetlog()
        .args(&["read", "--dir", &temp.log_arg()])
        .passes()
        .stdout_has("two")
        .stdout_has("three")
        .stdout_lacks("node-a#1 ");
}

#[test]
fn repaired_log_scans_clean() {
    let temp = damaged_log();
    temp.fleetlog()
        .args(&["repair", "--dir", &temp.log_arg()])
        .passes();

    temp.fleetlog()
        .args(&["scan", "--dir", &temp.log_arg()])
        .passes()
        .stdout_has("generation 1")
        .stdout_has("clean");
}

#[test]
fn repair_keeps_a_copy_of_dropped_bytes() {
    let temp = damaged_log();

    temp.fleetlog()
        .args(&["repair", "--dir", &temp.log_arg()])
        .passes();

    let quarantine = LogDir::at(temp.log()).quarantine_dir();
    assert!(std::fs::read_dir(quarantine).unwrap().count() >= 1);
}

#[test]
fn repair_json_summarizes_the_rebuild() {
    let temp = damaged_log();

    let run = temp
        .fleetlog()
        .args(&["repair", "--dir", &temp.log_arg(), "--format", "json"])
        .passes();

    let summary = run.json();
    assert_eq!(summary["from_generation"], 0);
    assert_eq!(summary["to_generation"], 1);
    assert_eq!(summary["records_kept"], 2);
}

#[test]
fn appends_continue_after_repair() {
    let temp = damaged_log();
    temp.fleetlog()
        .args(&["repair", "--dir", &temp.log_arg()])
        .passes();

    temp.fleetlog()
        .args(&["append", "--dir", &temp.log_arg(), "--origin", "node-a", "four"])
        .passes()
        .stdout_has("node-a#4 ");
}
