// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;
use yare::parameterized;

#[test]
fn open_creates_generation_zero() {
    let tmp = tempdir().unwrap();
    let dir = LogDir::open(tmp.path().join("log")).unwrap();

    assert_eq!(dir.generation().unwrap(), 0);
    assert!(dir.staging_dir().is_dir());
    assert!(dir.quarantine_dir().is_dir());
    assert!(dir.replicas_dir().is_dir());
}

#[test]
fn open_keeps_existing_generation() {
    let tmp = tempdir().unwrap();
    let dir = LogDir::open(tmp.path()).unwrap();
    dir.set_generation(7).unwrap();

    let reopened = LogDir::open(tmp.path()).unwrap();
    assert_eq!(reopened.generation().unwrap(), 7);
}

#[test]
fn garbage_current_is_rejected() {
    let tmp = tempdir().unwrap();
    let dir = LogDir::open(tmp.path()).unwrap();
    std::fs::write(dir.current_path(), "seven").unwrap();

    assert!(matches!(
        dir.generation(),
        Err(LogError::InvalidGeneration(raw)) if raw == "seven"
    ));
}

#[test]
fn file_names_are_zero_padded() {
    let dir = LogDir { root: PathBuf::from("/d") };
    assert_eq!(dir.log_path(3), PathBuf::from("/d/log.00000003"));
    assert_eq!(
        dir.snapshot_path(12),
        PathBuf::from("/d/snapshot.00000012.json")
    );
}

#[parameterized(
    log = { "log.00000004", Some(4) },
    unpadded = { "log.9", Some(9) },
    lock = { "log.lock", None },
    temp = { "log.00000004.tmp", None },
    empty = { "log.", None },
)]
fn parses_log_generations(name: &str, expected: Option<u64>) {
    assert_eq!(parse_log_generation(name), expected);
}

#[parameterized(
    snapshot = { "snapshot.00000002.json", Some(2) },
    temp = { "snapshot.00000002.json.tmp", None },
    other = { "snapshot.json", None },
)]
fn parses_snapshot_generations(name: &str, expected: Option<u64>) {
    assert_eq!(parse_snapshot_generation(name), expected);
}

#[test]
fn remove_other_generations_keeps_current() {
    let tmp = tempdir().unwrap();
    let dir = LogDir::open(tmp.path()).unwrap();
    dir.set_generation(2).unwrap();
    for path in [
        dir.log_path(1),
        dir.snapshot_path(1),
        dir.log_path(2),
        dir.snapshot_path(2),
        dir.log_path(3),
        tmp.path().join("log.00000003.tmp"),
    ] {
        std::fs::write(path, b"x").unwrap();
    }

    let removed = dir.remove_other_generations(2).unwrap();

    assert_eq!(removed.len(), 4);
    assert!(dir.log_path(2).exists());
    assert!(dir.snapshot_path(2).exists());
    assert!(!dir.log_path(1).exists());
    assert!(!dir.log_path(3).exists());
    assert!(dir.current_path().exists());
}

#[test]
fn orphaned_staging_files_are_removed() {
    let tmp = tempdir().unwrap();
    let dir = LogDir::open(tmp.path()).unwrap();
    std::fs::write(dir.staging_dir().join("123-abc.frame"), b"frame").unwrap();

    assert_eq!(dir.remove_orphaned_staging().unwrap(), 1);
    assert_eq!(std::fs::read_dir(dir.staging_dir()).unwrap().count(), 0);
}
