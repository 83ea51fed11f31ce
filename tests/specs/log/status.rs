//! Status specs
//!
//! Verify status summarizes a log without changing it.

use crate::prelude::*;
use fleetlog_core::{ReplicaRegistry, ReplicaState};

#[test]
fn status_of_fresh_log() {
    let temp = Project::empty();
    temp.append("node-a", &["one", "two"]);

    temp.fleetlog()
        .args(&["status", "--dir", &temp.log_arg()])
        .passes()
        .stdout_has("Generation: 0")
        .stdout_has("2 records")
        .stdout_has("Snapshot: none")
        .stdout_has("Replicas: none");
}

#[test]
fn status_flags_bytes_past_the_valid_prefix() {
    let temp = Project::empty();
    temp.append("node-a", &["one"]);
    let tail = temp.tail();
    let mut bytes = std::fs::read(&tail).unwrap();
    bytes.extend_from_slice(&[0, 0, 1]);
    std::fs::write(&tail, &bytes).unwrap();

    temp.fleetlog()
        .args(&["status", "--dir", &temp.log_arg()])
        .passes()
        .stdout_has("3 byte(s) past the valid prefix");

    // Status never heals
    assert_eq!(std::fs::read(&tail).unwrap(), bytes);
}

#[test]
fn status_lists_replica_watermarks() {
    let temp = Project::empty();
    temp.append("node-a", &["one", "two"]);
    let registry = ReplicaRegistry::new(&LogDir::open(temp.log()).unwrap());
    let mut state = ReplicaState::new("bucket");
    state.pushed.advance(&OriginId::new("node-a").unwrap(), 2);
    registry.save(&state).unwrap();

    temp.fleetlog()
        .args(&["status", "--dir", &temp.log_arg()])
        .passes()
        .stdout_has("bucket")
        .stdout_has("pushed={node-a:2}");
}

#[test]
fn status_json_reports_generation_after_repair() {
    let temp = Project::empty();
    temp.append("node-a", &["one", "two"]);
    temp.fleetlog()
        .args(&["repair", "--dir", &temp.log_arg()])
        .passes();

    let run = temp
        .fleetlog()
        .args(&["status", "--dir", &temp.log_arg(), "--format", "json"])
        .passes();

    let status = run.json();
    assert_eq!(status["generation"], 1);
    assert_eq!(status["tail_records"], 2);
    assert_eq!(status["unvalidated_bytes"], 0);
    assert!(status["snapshot"].is_null());
}
