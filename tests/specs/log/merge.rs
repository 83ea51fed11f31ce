//! Merge specs
//!
//! Verify replicas merge into one canonical, order-independent file.

use crate::prelude::*;
use similar_asserts::assert_eq;

fn two_replicas() -> (Project, String, String) {
    let temp = Project::empty();
    let a = temp.path().join("a").display().to_string();
    let b = temp.path().join("b").display().to_string();
    for (dir, origin, payloads) in [(&a, "node-a", ["a1", "a2"]), (&b, "node-b", ["b1", "b2"])] {
        for payload in payloads {
            temp.fleetlog()
                .args(&["append", "--dir", dir, "--origin", origin, payload])
                .passes();
        }
    }
    (temp, a, b)
}

#[test]
fn merge_writes_the_union() {
    let (temp, a, b) = two_replicas();
    let out = temp.path().join("merged.log");

    temp.fleetlog()
        .args(&["merge", "--out", out.to_str().unwrap(), &a, &b])
        .passes()
        .stdout_has("wrote 4 record(s)")
        .stdout_has("0 duplicate(s) dropped");
    assert!(out.exists());
}

#[test]
fn merge_is_independent_of_input_order() {
    let (temp, a, b) = two_replicas();
    let ab = temp.path().join("ab.log");
    let ba = temp.path().join("ba.log");

    temp.fleetlog()
        .args(&["merge", "--out", ab.to_str().unwrap(), &a, &b])
        .passes();
    temp.fleetlog()
        .args(&["merge", "--out", ba.to_str().unwrap(), &b, &a])
        .passes();

    assert_eq!(std::fs::read(&ab).unwrap(), std::fs::read(&ba).unwrap());
}

#[test]
fn merging_a_replica_with_itself_drops_duplicates() {
    let (temp, a, _) = two_replicas();
    let out = temp.path().join("merged.log");

    temp.fleetlog()
        .args(&["merge", "--out", out.to_str().unwrap(), &a, &a])
        .passes()
        .stdout_has("wrote 2 record(s)")
        .stdout_has("2 duplicate(s) dropped");
    assert_eq!(
        std::fs::read(&out).unwrap(),
        std::fs::read(temp.tail_of(std::path::Path::new(&a))).unwrap()
    );
}

#[test]
fn forks_are_listed_and_both_versions_kept() {
    let temp = Project::empty();
    let mine = record("node-a", 1, 1, "mine");
    let theirs = record("node-a", 1, 1, "theirs");
    let left = temp.file("left.log", frame::encode(&mine));
    let right = temp.file("right.log", frame::encode(&theirs));
    let out = temp.path().join("merged.log");

    temp.fleetlog()
        .args(&[
            "merge",
            "--out",
            out.to_str().unwrap(),
            left.to_str().unwrap(),
            right.to_str().unwrap(),
        ])
        .passes()
        .stdout_has("fork node-a#1")
        .stdout_has(&mine.checksum.short())
        .stdout_has(&theirs.checksum.short());

    let merged_len = std::fs::metadata(&out).unwrap().len() as usize;
    assert_eq!(merged_len, frame::encoded_len(&mine) + frame::encoded_len(&theirs));
}

#[test]
fn damaged_input_is_salvaged() {
    let temp = Project::empty();
    let good = [record("node-a", 1, 1, "one"), record("node-a", 2, 2, "two")];
    let mut bytes = frame::encode(&good[0]);
    bytes.extend_from_slice(b"garbage!");
    bytes.extend(frame::encode(&good[1]));
    let input = temp.file("damaged.log", bytes);
    let out = temp.path().join("merged.log");

    temp.fleetlog()
        .args(&["merge", "--out", out.to_str().unwrap(), input.to_str().unwrap()])
        .passes()
        .stdout_has("wrote 2 record(s)")
        .stdout_has("salvaged damaged input");
    assert_eq!(std::fs::read(&out).unwrap(), frame::encode_all(&good));
}

#[test]
fn merge_json_lists_forks() {
    let temp = Project::empty();
    let left = temp.file("left.log", frame::encode(&record("node-a", 1, 1, "x")));
    let right = temp.file("right.log", frame::encode(&record("node-a", 1, 1, "y")));
    let out = temp.path().join("merged.log");

    let run = temp
        .fleetlog()
        .args(&[
            "--format",
            "json",
            "merge",
            "--out",
            out.to_str().unwrap(),
            left.to_str().unwrap(),
            right.to_str().unwrap(),
        ])
        .passes();

    let outcome = run.json();
    assert_eq!(outcome["records"], 2);
    assert_eq!(outcome["forks"][0]["id"]["origin"], "node-a");
    assert_eq!(outcome["forks"][0]["checksums"].as_array().unwrap().len(), 2);
}
