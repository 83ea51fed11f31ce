//! Scan specs
//!
//! Verify damage is reported, crashed tails are healed and interior
//! damage is left for an operator.

use crate::prelude::*;

/// Flip the CRC of the first frame so it sits between two valid frames
fn damage_first_frame(temp: &Project) -> usize {
    let tail = temp.tail();
    let mut bytes = std::fs::read(&tail).unwrap();
    let first_len = frame::encoded_len(&record("node-a", 1, 1, "one"));
    bytes[first_len - 1] ^= 0xff;
    std::fs::write(&tail, &bytes).unwrap();
    first_len
}

#[test]
fn clean_log_scans_clean() {
    let temp = Project::empty();
    temp.append("node-a", &["one", "two"]);

    temp.fleetlog()
        .args(&["scan", "--dir", &temp.log_arg()])
        .passes()
        .stdout_has("2 record(s)")
        .stdout_has("clean");
}

#[test]
fn crashed_writer_fragment_is_healed() {
    let temp = Project::empty();
    temp.append("node-a", &["one", "two"]);
    let tail = temp.tail();
    let clean_len = std::fs::metadata(&tail).unwrap().len();
    let mut bytes = std::fs::read(&tail).unwrap();
    bytes.extend_from_slice(&[0, 0, 1]);
    std::fs::write(&tail, bytes).unwrap();

    let run = temp
        .fleetlog()
        .args(&["scan", "--dir", &temp.log_arg(), "--format", "json"])
        .passes();

    let report = run.json();
    assert_eq!(report["needs_attention"], false);
    assert_eq!(report["findings"][0]["kind"], "recovered_truncation");
    assert_eq!(report["findings"][0]["offset"], clean_len);
    assert_eq!(report["findings"][0]["bytes_dropped"], 3);
    assert_eq!(std::fs::metadata(&tail).unwrap().len(), clean_len);
}

#[test]
fn healed_log_accepts_new_appends() {
    let temp = Project::empty();
    temp.append("node-a", &["one"]);
    let tail = temp.tail();
    let mut bytes = std::fs::read(&tail).unwrap();
    bytes.extend_from_slice(&[0, 0, 1]);
    std::fs::write(&tail, bytes).unwrap();

    temp.fleetlog()
        .args(&["scan", "--dir", &temp.log_arg()])
        .passes()
        .stdout_has("recovered truncation");
    temp.append("node-a", &["two"]);

    temp.fleetlog()
        .args(&["read", "--dir", &temp.log_arg()])
        .passes()
        .stdout_has("node-a#2")
        .stderr_has("end of log");
}

#[test]
fn interior_damage_exits_with_attention_code() {
    let temp = Project::empty();
    temp.append("node-a", &["one", "two", "three"]);
    let tail = temp.tail();
    damage_first_frame(&temp);
    let damaged = std::fs::read(&tail).unwrap();

    temp.fleetlog()
        .args(&["scan", "--dir", &temp.log_arg()])
        .exits_with(2)
        .stdout_has("2 record(s)")
        .stdout_has("needs attention: 1 damaged span(s)");

    // Interior damage is never removed by a scan
    assert_eq!(std::fs::read(&tail).unwrap(), damaged);
}

#[test]
fn interior_damage_is_quarantined() {
    let temp = Project::empty();
    temp.append("node-a", &["one", "two"]);
    let first_len = damage_first_frame(&temp);

    let run = temp
        .fleetlog()
        .args(&["scan", "--dir", &temp.log_arg(), "--format", "json"])
        .exits_with(2);

    let report = run.json();
    let finding = &report["findings"][0];
    assert!(matches!(
        finding["kind"].as_str(),
        Some("mid_stream_corruption") | Some("checksum_mismatch")
    ));
    assert_eq!(finding["span"]["start"], 0);
    assert_eq!(finding["span"]["end"], first_len);
    let quarantined = finding["quarantined"].as_str().unwrap();
    assert!(std::path::Path::new(quarantined).exists());
}

#[test]
fn no_quarantine_reports_without_copying() {
    let temp = Project::empty();
    temp.append("node-a", &["one", "two"]);
    damage_first_frame(&temp);

    let run = temp
        .fleetlog()
        .args(&["scan", "--dir", &temp.log_arg(), "--no-quarantine", "--format", "json"])
        .exits_with(2);

    assert!(run.json()["findings"][0]["quarantined"].is_null());
    let quarantine = LogDir::at(temp.log()).quarantine_dir();
    assert_eq!(std::fs::read_dir(quarantine).unwrap().count(), 0);
}
