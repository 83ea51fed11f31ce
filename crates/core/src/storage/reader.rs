// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log reader for iterating and validating frames
//!
//! The reader yields records whose frame decodes and whose checksum verifies,
//! and stops at the first frame that does not. It never skips forward past
//! bad bytes; finding later valid frames is the corruption guard's job.

use crate::config::DEFAULT_MAX_PAYLOAD_LEN;
use crate::frame::{self, FrameError, HEADER_LEN, TRAILER_LEN};
use crate::id::RecordId;
use crate::record::Record;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Why a read stopped before end-of-file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopKind {
    /// File ends inside a frame
    Truncated,
    /// Bytes that cannot be a frame
    CorruptFrame { reason: String },
    /// Well-formed frame whose record checksum does not verify
    ChecksumMismatch { record_id: RecordId, frame_len: u64 },
}

/// Where and why a read stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadStop {
    /// Byte offset of the first bad frame
    pub offset: u64,
    /// Bytes successfully validated between the read start and `offset`
    pub validated_bytes: u64,
    pub kind: StopKind,
}

/// Reader over one frame file
#[derive(Debug, Clone)]
pub struct LogReader {
    path: PathBuf,
    max_body_len: usize,
}

impl LogReader {
    /// Reader for a frame file; a missing file reads as empty
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_body_len: frame::max_body_len(DEFAULT_MAX_PAYLOAD_LEN),
        }
    }

    pub fn with_max_body_len(mut self, max_body_len: usize) -> Self {
        self.max_body_len = max_body_len;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Iterate from the start of the file
    pub fn records(&self) -> io::Result<RecordIter> {
        self.read_from(0)
    }

    /// Iterate from a byte offset previously returned by `RecordIter::position`
    pub fn read_from(&self, offset: u64) -> io::Result<RecordIter> {
        let reader = match File::open(&self.path) {
            Ok(mut file) => {
                file.seek(SeekFrom::Start(offset))?;
                Some(BufReader::new(file))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(e),
        };
        Ok(RecordIter {
            reader,
            start: offset,
            position: offset,
            max_body_len: self.max_body_len,
            stop: None,
            done: false,
        })
    }

    /// Current file length (0 if missing)
    pub fn file_len(&self) -> io::Result<u64> {
        match std::fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e),
        }
    }

    /// Walk the whole file and summarize its valid prefix
    pub fn validate(&self) -> io::Result<LogValidation> {
        let mut iter = self.records()?;
        let mut records = 0u64;
        for record in iter.by_ref() {
            record?;
            records += 1;
        }
        Ok(LogValidation {
            records,
            valid_bytes: iter.position(),
            file_len: self.file_len()?.max(iter.position()),
            stop: iter.stop().cloned(),
        })
    }
}

/// Lazy, forward-only iterator over valid records
pub struct RecordIter {
    reader: Option<BufReader<File>>,
    start: u64,
    position: u64,
    max_body_len: usize,
    stop: Option<ReadStop>,
    done: bool,
}

impl RecordIter {
    /// Offset just past the last yielded record; a valid resume point
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Why iteration ended early, if it did
    pub fn stop(&self) -> Option<&ReadStop> {
        self.stop.as_ref()
    }

    fn halt(&mut self, kind: StopKind) -> Option<io::Result<Record>> {
        self.stop = Some(ReadStop {
            offset: self.position,
            validated_bytes: self.position - self.start,
            kind,
        });
        self.done = true;
        None
    }

    fn read_frame(&mut self) -> io::Result<Option<Vec<u8>>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };
        let mut buf = Vec::with_capacity(HEADER_LEN);
        reader.by_ref().take(HEADER_LEN as u64).read_to_end(&mut buf)?;
        if buf.len() < HEADER_LEN {
            return Ok(Some(buf));
        }
        // Bounds-check the declared length before reading that many bytes
        if let Err(FrameError::Corrupt(_)) = frame::decode(&buf, self.max_body_len) {
            return Ok(Some(buf));
        }
        let header = [buf[0], buf[1], buf[2], buf[3]];
        let rest = frame::declared_body_len(&header) + TRAILER_LEN;
        reader.by_ref().take(rest as u64).read_to_end(&mut buf)?;
        Ok(Some(buf))
    }
}

impl Iterator for RecordIter {
    type Item = io::Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let buf = match self.read_frame() {
            Ok(Some(buf)) => buf,
            Ok(None) => {
                self.done = true;
                return None;
            }
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        if buf.is_empty() {
            self.done = true;
            return None;
        }

        match frame::decode(&buf, self.max_body_len) {
            Ok((record, used)) => {
                if !record.verify() {
                    return self.halt(StopKind::ChecksumMismatch {
                        record_id: record.id(),
                        frame_len: used as u64,
                    });
                }
                self.position += used as u64;
                Some(Ok(record))
            }
            Err(FrameError::Incomplete { .. }) => self.halt(StopKind::Truncated),
            Err(FrameError::Corrupt(reason)) => self.halt(StopKind::CorruptFrame { reason }),
        }
    }
}

/// Summary of a file's valid prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogValidation {
    pub records: u64,
    /// Length of the longest valid prefix
    pub valid_bytes: u64,
    pub file_len: u64,
    pub stop: Option<ReadStop>,
}

impl LogValidation {
    pub fn is_clean(&self) -> bool {
        self.stop.is_none()
    }
}

#[cfg(test)]
#[path = "reader_tests.rs"]
mod tests;
