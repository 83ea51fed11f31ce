// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Damage-tolerant walk over a frame file
//!
//! Splits a file into valid records, interior damaged spans (bytes followed
//! by a later frame that decodes) and a trailing partial frame. Used by the
//! writer to catch up, and by the guard to build damage reports.

use super::reader::{LogReader, ReadStop, StopKind};
use crate::frame;
use crate::record::Record;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

#[derive(Debug, Clone)]
pub(crate) enum Segment {
    Record {
        offset: u64,
        len: u64,
        record: Record,
    },
    /// Bytes in `[start, end)` that are not valid frames; `end` is the next
    /// offset at which a frame decodes, or end-of-file
    Damaged { start: u64, end: u64, stop: ReadStop },
    /// A write that never completed: `[start, end)` runs to end-of-file and
    /// cannot hold a complete frame
    PartialTail { start: u64, end: u64 },
}

/// Walk `reader`'s file from `from`, reporting each segment to `visit`
///
/// Returns the offset the walk ended at: end-of-file, or the start of a
/// partial tail.
pub(crate) fn walk<E>(
    reader: &LogReader,
    from: u64,
    max_body_len: usize,
    mut visit: impl FnMut(Segment) -> Result<(), E>,
) -> Result<u64, E>
where
    E: From<io::Error>,
{
    let mut offset = from;
    loop {
        let mut iter = reader.read_from(offset)?;
        while let Some(record) = iter.next() {
            let record = record?;
            let len = frame::encoded_len(&record) as u64;
            let at = iter.position() - len;
            visit(Segment::Record {
                offset: at,
                len,
                record,
            })?;
        }
        offset = iter.position();
        let Some(stop) = iter.stop().cloned() else {
            return Ok(offset);
        };

        if let StopKind::ChecksumMismatch { frame_len, .. } = &stop.kind {
            let end = stop.offset + frame_len;
            visit(Segment::Damaged {
                start: stop.offset,
                end,
                stop,
            })?;
            offset = end;
            continue;
        }

        let file_len = reader.file_len()?;
        match find_resync(reader, stop.offset + 1, max_body_len)? {
            Some(resync) => {
                visit(Segment::Damaged {
                    start: stop.offset,
                    end: resync,
                    stop,
                })?;
                offset = resync;
            }
            None if is_partial_write(reader, &stop, file_len)? => {
                visit(Segment::PartialTail {
                    start: stop.offset,
                    end: file_len,
                })?;
                return Ok(stop.offset);
            }
            None => {
                visit(Segment::Damaged {
                    start: stop.offset,
                    end: file_len,
                    stop,
                })?;
                return Ok(file_len);
            }
        }
    }
}

/// Bytes examined per step of a resync search
const RESYNC_WINDOW: usize = 64 * 1024;

/// Bytes needed to judge whether an offset could start a frame
const PEEK_LEN: usize = frame::HEADER_LEN + 1;

/// First offset at or after `from` where a complete frame decodes
///
/// Slides a fixed window over the file. Only offsets whose header is
/// plausible and whose declared frame fits in the file are decoded.
pub(crate) fn find_resync(
    reader: &LogReader,
    from: u64,
    max_body_len: usize,
) -> io::Result<Option<u64>> {
    let Some(mut file) = open_existing(reader.path())? else {
        return Ok(None);
    };
    let file_len = file.metadata()?.len();
    let mut window = Vec::with_capacity(RESYNC_WINDOW + PEEK_LEN);
    let mut window_start = from;
    while window_start < file_len {
        read_at(&mut file, window_start, RESYNC_WINDOW + PEEK_LEN, &mut window)?;
        let candidates = window.len().min(RESYNC_WINDOW);
        for i in 0..candidates {
            let peek = &window[i..window.len().min(i + PEEK_LEN)];
            let Some(total) = frame::plausible_len(peek, max_body_len) else {
                continue;
            };
            let at = window_start + i as u64;
            if at + total as u64 > file_len {
                continue;
            }
            let mut candidate = Vec::with_capacity(total);
            read_at(&mut file, at, total, &mut candidate)?;
            if frame::decode(&candidate, max_body_len).is_ok() {
                return Ok(Some(at));
            }
        }
        window_start += RESYNC_WINDOW as u64;
    }
    Ok(None)
}

/// Whether trailing bytes look like an interrupted append
///
/// A frame that runs past end-of-file is partial. So is an all-zero tail,
/// which some filesystems leave when the size was extended but data blocks
/// were not yet written. A complete-length frame that fails its CRC is not:
/// it was durable once, so it is damage.
fn is_partial_write(reader: &LogReader, stop: &ReadStop, file_len: u64) -> io::Result<bool> {
    if stop.kind == StopKind::Truncated {
        return Ok(true);
    }
    if file_len <= stop.offset {
        return Ok(false);
    }
    let Some(mut file) = open_existing(reader.path())? else {
        return Ok(false);
    };
    let mut chunk = Vec::with_capacity(RESYNC_WINDOW);
    let mut at = stop.offset;
    while at < file_len {
        read_at(&mut file, at, RESYNC_WINDOW, &mut chunk)?;
        if chunk.is_empty() {
            break;
        }
        if chunk.iter().any(|b| *b != 0) {
            return Ok(false);
        }
        at += chunk.len() as u64;
    }
    Ok(true)
}

/// Bytes in `[start, end)`, cut short at end-of-file
pub(crate) fn read_span(reader: &LogReader, start: u64, end: u64) -> io::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    if let Some(mut file) = open_existing(reader.path())? {
        read_at(&mut file, start, end.saturating_sub(start) as usize, &mut bytes)?;
    }
    Ok(bytes)
}

fn open_existing(path: &Path) -> io::Result<Option<File>> {
    match File::open(path) {
        Ok(file) => Ok(Some(file)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Replace `buf` with up to `len` bytes starting at `offset`
fn read_at(file: &mut File, offset: u64, len: usize, buf: &mut Vec<u8>) -> io::Result<()> {
    buf.clear();
    file.seek(SeekFrom::Start(offset))?;
    file.by_ref().take(len as u64).read_to_end(buf)?;
    Ok(())
}

#[cfg(test)]
#[path = "walk_tests.rs"]
mod tests;
