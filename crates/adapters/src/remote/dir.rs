// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Directory-backed object store replica
//!
//! Layout under the root:
//!
//! ```text
//! records/<origin>/<sequence:020>-<checksum>.frame   one frame per object
//! tmp/<token>.frame                                  objects being written
//! ack.json                                           joined acknowledged watermark
//! ```
//!
//! Objects are immutable. A put writes the frame to `tmp/`, fsyncs it, then
//! hard-links it to its final name; the link fails if the name already exists,
//! which gives put-if-absent on any POSIX filesystem.

use super::{DamagedObject, Fetched, PutSummary, RemoteError, RemoteReplica};
use async_trait::async_trait;
use fleetlog_core::config::DEFAULT_MAX_PAYLOAD_LEN;
use fleetlog_core::frame;
use fleetlog_core::storage::fsync::{fsync_dir, remove_if_exists, write_atomic, write_synced};
use fleetlog_core::{Checksum, IdGen, OriginId, Record, RecordId, UuidIdGen, Watermark};
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const RECORDS_DIR: &str = "records";
const TMP_DIR: &str = "tmp";
const ACK_FILE: &str = "ack.json";
const OBJECT_SUFFIX: &str = ".frame";

/// Replica stored as one object per record under a directory
#[derive(Clone)]
pub struct DirRemote {
    name: String,
    root: PathBuf,
    max_body_len: usize,
}

impl DirRemote {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            max_body_len: frame::max_body_len(DEFAULT_MAX_PAYLOAD_LEN),
        }
    }

    pub fn with_max_body_len(mut self, max_body_len: usize) -> Self {
        self.max_body_len = max_body_len;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Final object path for a record
    pub fn object_path(&self, record: &Record) -> PathBuf {
        object_path(&self.root, record)
    }
}

#[async_trait]
impl RemoteReplica for DirRemote {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_after(&self, after: &Watermark) -> Result<Fetched, RemoteError> {
        let root = self.root.clone();
        let after = after.clone();
        let max_body_len = self.max_body_len;
        blocking(move || fetch_after(&root, &after, max_body_len)).await
    }

    async fn put(&self, records: &[Record]) -> Result<PutSummary, RemoteError> {
        let root = self.root.clone();
        let records = records.to_vec();
        blocking(move || put(&root, &records, &UuidIdGen)).await
    }

    async fn acknowledge(&self, mark: &Watermark) -> Result<(), RemoteError> {
        let root = self.root.clone();
        let mark = mark.clone();
        blocking(move || {
            let joined = read_ack(&root)?.join(&mark);
            fs::create_dir_all(&root)?;
            write_atomic(&root.join(ACK_FILE), &to_json(&joined)?)?;
            Ok(())
        })
        .await
    }

    async fn acknowledged(&self) -> Result<Watermark, RemoteError> {
        let root = self.root.clone();
        blocking(move || read_ack(&root)).await
    }
}

/// Run filesystem work off the async executor
async fn blocking<T, F>(f: F) -> Result<T, RemoteError>
where
    F: FnOnce() -> Result<T, RemoteError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| RemoteError::Unavailable(format!("blocking task failed: {}", e)))?
}

fn object_path(root: &Path, record: &Record) -> PathBuf {
    root.join(RECORDS_DIR)
        .join(record.origin_id.as_str())
        .join(format!(
            "{:020}-{}{}",
            record.sequence,
            record.checksum.to_hex(),
            OBJECT_SUFFIX
        ))
}

/// `<sequence>-<checksum>.frame` -> `(sequence, checksum)`
fn parse_object_name(name: &str) -> Option<(u64, Checksum)> {
    let stem = name.strip_suffix(OBJECT_SUFFIX)?;
    let (sequence, checksum) = stem.split_once('-')?;
    Some((sequence.parse().ok()?, Checksum::from_hex(checksum)?))
}

fn fetch_after(root: &Path, after: &Watermark, max_body_len: usize) -> Result<Fetched, RemoteError> {
    let origins = match fs::read_dir(root.join(RECORDS_DIR)) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Fetched::default()),
        Err(e) => return Err(e.into()),
    };

    let mut fetched = Fetched::default();
    for entry in origins {
        let entry = entry?;
        let dir_name = entry.file_name().to_string_lossy().into_owned();
        let origin = match OriginId::new(dir_name.as_str()) {
            Ok(origin) => origin,
            Err(e) => {
                fetched
                    .damaged
                    .push(damaged(&entry.path(), None, e.to_string()));
                continue;
            }
        };
        let floor = after.get(&origin);

        for object in fs::read_dir(entry.path())? {
            let object = object?;
            let file_name = object.file_name().to_string_lossy().into_owned();
            let Some((sequence, checksum)) = parse_object_name(&file_name) else {
                tracing::debug!(origin = %origin, file_name = %file_name, "ignoring non-object file");
                continue;
            };
            if sequence <= floor {
                continue;
            }
            let path = object.path();
            let id = RecordId::new(origin.clone(), sequence);
            match read_object(&path, max_body_len)? {
                Ok(record)
                    if record.origin_id == origin
                        && record.sequence == sequence
                        && record.checksum == checksum =>
                {
                    fetched.records.push(record)
                }
                Ok(record) => fetched.damaged.push(damaged(
                    &path,
                    Some(id),
                    format!("object name does not match record {}", record.id()),
                )),
                Err(reason) => fetched.damaged.push(damaged(&path, Some(id), reason)),
            }
        }
    }
    fetched.records.sort_by(|a, b| {
        (&a.origin_id, a.sequence, &a.checksum).cmp(&(&b.origin_id, b.sequence, &b.checksum))
    });
    tracing::debug!(
        root = %root.display(),
        count = fetched.records.len(),
        damaged = fetched.damaged.len(),
        "fetched objects"
    );
    Ok(fetched)
}

/// Decode one object; the inner error is why its bytes are not a record
fn read_object(path: &Path, max_body_len: usize) -> Result<Result<Record, String>, RemoteError> {
    let bytes = fs::read(path)?;
    let (record, consumed) = match frame::decode(&bytes, max_body_len) {
        Ok(decoded) => decoded,
        Err(e) => return Ok(Err(e.to_string())),
    };
    if consumed != bytes.len() {
        return Ok(Err(format!(
            "{} trailing bytes after frame",
            bytes.len() - consumed
        )));
    }
    if !record.verify() {
        return Ok(Err("checksum mismatch".to_string()));
    }
    Ok(Ok(record))
}

fn put<G: IdGen>(root: &Path, records: &[Record], ids: &G) -> Result<PutSummary, RemoteError> {
    let tmp_dir = root.join(TMP_DIR);
    fs::create_dir_all(&tmp_dir)?;

    let mut summary = PutSummary::default();
    let mut touched = BTreeSet::new();
    for record in records {
        if !record.verify() {
            return Err(RemoteError::Rejected(format!(
                "record {} does not verify",
                record.id()
            )));
        }
        let path = object_path(root, record);
        if path.exists() {
            summary.already_present += 1;
            continue;
        }
        let Some(origin_dir) = path.parent() else {
            continue;
        };
        if !origin_dir.exists() {
            fs::create_dir_all(origin_dir)?;
            touched.insert(root.join(RECORDS_DIR));
        }

        let tmp = tmp_dir.join(format!("{}{}", ids.next(), OBJECT_SUFFIX));
        write_synced(&tmp, &frame::encode(record))?;
        let linked = fs::hard_link(&tmp, &path);
        remove_if_exists(&tmp)?;
        match linked {
            Ok(()) => {
                summary.stored += 1;
                touched.insert(origin_dir.to_path_buf());
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => summary.already_present += 1,
            Err(e) => return Err(e.into()),
        }
    }
    for dir in touched {
        fsync_dir(&dir)?;
    }
    Ok(summary)
}

fn read_ack(root: &Path) -> Result<Watermark, RemoteError> {
    let path = root.join(ACK_FILE);
    match fs::read(&path) {
        Ok(bytes) => {
            serde_json::from_slice(&bytes).map_err(|e| corrupt(&path, e.to_string()))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Watermark::new()),
        Err(e) => Err(e.into()),
    }
}

fn to_json(mark: &Watermark) -> Result<Vec<u8>, RemoteError> {
    serde_json::to_vec_pretty(mark).map_err(|e| RemoteError::Rejected(e.to_string()))
}

fn damaged(path: &Path, id: Option<RecordId>, reason: String) -> DamagedObject {
    tracing::warn!(object = %path.display(), reason = %reason, "skipping damaged remote object");
    DamagedObject {
        object: path.display().to_string(),
        id,
        reason,
    }
}

fn corrupt(path: &Path, reason: String) -> RemoteError {
    tracing::warn!(object = %path.display(), reason = %reason, "corrupt remote object");
    RemoteError::Corrupt {
        object: path.display().to_string(),
        reason,
    }
}

#[cfg(test)]
#[path = "dir_tests.rs"]
mod tests;
