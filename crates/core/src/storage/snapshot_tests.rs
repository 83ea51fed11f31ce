// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::id::{OriginId, RecordId};
use crate::record::Record;
use std::collections::BTreeMap;
use tempfile::tempdir;

fn header() -> SnapshotHeader {
    let mut watermark = Watermark::new();
    watermark.advance(&OriginId::new("node-a").unwrap(), 4);
    SnapshotHeader {
        version: SNAPSHOT_VERSION,
        generation: 2,
        watermark,
        max_logical_clock: 9,
        records_folded: 4,
        created_at: Utc::now(),
    }
}

#[test]
fn missing_snapshot_is_none() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("snapshot.00000000.json");
    assert!(read_header(&path).unwrap().is_none());
    assert!(read_snapshot::<u64>(&path).unwrap().is_none());
}

#[test]
fn write_then_read_full_snapshot() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("snapshot.00000002.json");
    let state: BTreeMap<String, u64> = [("k".to_string(), 3)].into_iter().collect();
    let snapshot = Snapshot {
        header: header(),
        folded: FoldedIds::new(),
        state: state.clone(),
    };

    write_snapshot(&path, &snapshot).unwrap();

    let back: Snapshot<BTreeMap<String, u64>> = read_snapshot(&path).unwrap().unwrap();
    assert_eq!(back, snapshot);
}

#[test]
fn header_reads_without_knowing_state_type() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("snapshot.json");
    let snapshot = Snapshot {
        header: header(),
        folded: FoldedIds::new(),
        state: vec!["a", "b", "c"],
    };
    write_snapshot(&path, &snapshot).unwrap();

    assert_eq!(read_header(&path).unwrap(), Some(snapshot.header));
}

#[test]
fn unknown_version_is_rejected() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("snapshot.json");
    let mut h = header();
    h.version = 99;
    write_snapshot(&path, &Snapshot {
            header: h,
            folded: FoldedIds::new(),
            state: 0u8,
        }).unwrap();

    assert!(matches!(read_header(&path), Err(LogError::Snapshot(_))));
}

#[test]
fn garbage_is_a_snapshot_error() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("snapshot.json");
    std::fs::write(&path, b"{not json").unwrap();

    assert!(matches!(read_header(&path), Err(LogError::Snapshot(_))));
}

#[test]
fn folded_ids_survive_a_write_and_keep_every_version() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("snapshot.json");
    let origin = OriginId::new("node-a").unwrap();
    let first = Record::new(origin.clone(), 2, 5, 0, b"one".to_vec());
    let second = Record::new(origin.clone(), 2, 6, 0, b"two".to_vec());
    let mut folded = FoldedIds::new();
    folded.insert(&first);
    folded.insert(&second);
    folded.insert(&first);
    write_snapshot(
        &path,
        &Snapshot {
            header: header(),
            folded,
            state: "s",
        },
    )
    .unwrap();

    let (_, back) = read_folded(&path).unwrap().unwrap();
    let sums = back.checksums(&RecordId::new(origin.clone(), 2));
    assert_eq!(back.len(), 1);
    assert_eq!(sums.len(), 2);
    assert!(sums.contains(&first.checksum) && sums.contains(&second.checksum));
    assert!(back.checksums(&RecordId::new(origin, 3)).is_empty());
}

#[test]
fn snapshot_without_folded_ids_reads_as_empty() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("snapshot.json");
    let doc = serde_json::json!({ "header": header(), "state": 7 });
    std::fs::write(&path, serde_json::to_vec(&doc).unwrap()).unwrap();

    let (_, folded) = read_folded(&path).unwrap().unwrap();
    assert!(folded.is_empty());
    let full: Snapshot<u64> = read_snapshot(&path).unwrap().unwrap();
    assert_eq!(full.state, 7);
}
