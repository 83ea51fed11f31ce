//! Append and read specs
//!
//! Verify records round-trip through the CLI and reads stop cleanly.

use crate::prelude::*;

#[test]
fn append_prints_id_and_checksum() {
    let temp = Project::empty();

    let run = temp
        .fleetlog()
        .args(&["append", "--dir", &temp.log_arg(), "--origin", "node-a", "hello"])
        .passes()
        .stdout_has("node-a#1 ");
    let checksum = run.stdout().trim().rsplit(' ').next().unwrap().to_string();
    assert_eq!(checksum.len(), 64);
}

#[test]
fn append_reads_payload_from_stdin() {
    let temp = Project::empty();

    temp.fleetlog()
        .args(&["append", "--dir", &temp.log_arg(), "--origin", "node-a", "-"])
        .stdin("from stdin")
        .passes();

    temp.fleetlog()
        .args(&["read", "--dir", &temp.log_arg()])
        .passes()
        .stdout_has("from stdin");
}

#[test]
fn sequences_are_gapless_per_origin() {
    let temp = Project::empty();
    temp.append("node-a", &["one", "two"]);
    temp.append("node-b", &["three"]);
    temp.append("node-a", &["four"]);

    temp.fleetlog()
        .args(&["read", "--dir", &temp.log_arg()])
        .passes()
        .stdout_has("node-a#1")
        .stdout_has("node-a#2")
        .stdout_has("node-b#1")
        .stdout_has("node-a#3");
}

#[test]
fn logical_clock_increases_across_origins() {
    let temp = Project::empty();
    temp.append("node-a", &["one"]);
    temp.append("node-b", &["two"]);
    temp.append("node-a", &["three"]);

    let run = temp
        .fleetlog()
        .args(&["--format", "json", "read", "--dir", &temp.log_arg()])
        .passes();
    let clocks: Vec<u64> = run
        .json_lines()
        .iter()
        .map(|r| r["logical_clock"].as_u64().unwrap())
        .collect();
    assert_eq!(clocks, vec![1, 2, 3]);
}

#[test]
fn read_json_has_one_document_per_record() {
    let temp = Project::empty();
    temp.append("node-a", &["x", "y"]);

    let run = temp
        .fleetlog()
        .args(&["read", "--dir", &temp.log_arg(), "--format", "json"])
        .passes();
    let records = run.json_lines();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["payload"], "x");
    assert_eq!(records[1]["id"]["sequence"], 2);
}

#[test]
fn read_reports_end_offset_for_resuming() {
    let temp = Project::empty();
    temp.append("node-a", &["first"]);
    let tail_len = std::fs::metadata(temp.tail()).unwrap().len();

    temp.fleetlog()
        .args(&["read", "--dir", &temp.log_arg()])
        .passes()
        .stderr_has(&format!("end of log at offset {}", tail_len));

    temp.append("node-a", &["second"]);
    temp.fleetlog()
        .args(&["read", "--dir", &temp.log_arg(), "--from", &tail_len.to_string()])
        .passes()
        .stdout_has("second")
        .stdout_lacks("first");
}

#[test]
fn read_stops_at_a_partial_tail_without_modifying_it() {
    let temp = Project::empty();
    temp.append("node-a", &["kept"]);
    let tail = temp.tail();
    let clean_len = std::fs::metadata(&tail).unwrap().len();
    let mut bytes = std::fs::read(&tail).unwrap();
    bytes.extend_from_slice(&[0, 0, 1]);
    std::fs::write(&tail, &bytes).unwrap();

    temp.fleetlog()
        .args(&["read", "--dir", &temp.log_arg()])
        .passes()
        .stdout_has("kept")
        .stderr_has(&format!("stopped at offset {}", clean_len))
        .stderr_has("partial frame");
    assert_eq!(std::fs::read(&tail).unwrap(), bytes);
}

#[test]
fn tail_holds_exactly_one_frame_per_append() {
    let temp = Project::empty();
    let payload = "x".repeat(64);

    temp.fleetlog()
        .args(&["append", "--dir", &temp.log_arg(), "--origin", "node-a", &payload])
        .passes();
    assert_eq!(
        std::fs::metadata(temp.tail()).unwrap().len() as usize,
        frame::encoded_len(&record("node-a", 1, 1, &payload))
    );
}
