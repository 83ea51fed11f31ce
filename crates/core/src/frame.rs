// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Binary frame codec for log records
//!
//! ```text
//! [u32 body_len][body][u32 crc32(len ‖ body)]
//!
//! body = version u8 ‖ sequence u64 ‖ logical_clock u64 ‖ wall_time_micros u64
//!      ‖ origin_len u16 ‖ origin ‖ payload_len u32 ‖ payload ‖ checksum [32]
//! ```
//!
//! All integers are big-endian. The CRC covers the length prefix and the
//! body, so any flipped byte in a complete frame fails decoding.

use crate::id::{OriginId, MAX_ORIGIN_LEN};
use crate::record::{Checksum, Record};
use thiserror::Error;

pub const FRAME_VERSION: u8 = 1;

/// Length prefix size
pub const HEADER_LEN: usize = 4;

/// CRC trailer size
pub const TRAILER_LEN: usize = 4;

/// Body bytes that do not depend on origin or payload length
const FIXED_BODY_LEN: usize = 1 + 8 + 8 + 8 + 2 + 4 + 32;

/// Largest body a frame may declare for the given payload limit
pub fn max_body_len(max_payload_len: usize) -> usize {
    FIXED_BODY_LEN + MAX_ORIGIN_LEN + max_payload_len
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Not enough bytes yet: a partial write or a read racing a writer
    #[error("incomplete frame: need {needed} bytes, have {available}")]
    Incomplete { needed: usize, available: usize },
    /// The bytes can never form a valid frame
    #[error("corrupt frame: {0}")]
    Corrupt(String),
}

/// Size of the encoded frame for a record
pub fn encoded_len(record: &Record) -> usize {
    HEADER_LEN
        + FIXED_BODY_LEN
        + record.origin_id.as_str().len()
        + record.payload.len()
        + TRAILER_LEN
}

/// Encode a record into a self-delimiting frame
pub fn encode(record: &Record) -> Vec<u8> {
    let origin = record.origin_id.as_str().as_bytes();
    let body_len = FIXED_BODY_LEN + origin.len() + record.payload.len();

    let mut buf = Vec::with_capacity(HEADER_LEN + body_len + TRAILER_LEN);
    buf.extend_from_slice(&(body_len as u32).to_be_bytes());
    buf.push(FRAME_VERSION);
    buf.extend_from_slice(&record.sequence.to_be_bytes());
    buf.extend_from_slice(&record.logical_clock.to_be_bytes());
    buf.extend_from_slice(&record.wall_time_micros.to_be_bytes());
    buf.extend_from_slice(&(origin.len() as u16).to_be_bytes());
    buf.extend_from_slice(origin);
    buf.extend_from_slice(&(record.payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(&record.payload);
    buf.extend_from_slice(&record.checksum.0);

    let crc = crc32fast::hash(&buf);
    buf.extend_from_slice(&crc.to_be_bytes());
    buf
}

/// Encode a batch of records back to back
pub fn encode_all<'a>(records: impl IntoIterator<Item = &'a Record>) -> Vec<u8> {
    let mut buf = Vec::new();
    for record in records {
        buf.extend_from_slice(&encode(record));
    }
    buf
}

/// Read the declared body length from a frame header
pub fn declared_body_len(header: &[u8; HEADER_LEN]) -> usize {
    u32::from_be_bytes(*header) as usize
}

/// Total frame length declared by `prefix`, if it could start a frame
///
/// Looks only at the length prefix and, when present, the version byte, so
/// it is cheap to try at every offset of a damaged region.
pub fn plausible_len(prefix: &[u8], max_body_len: usize) -> Option<usize> {
    if prefix.len() < HEADER_LEN {
        return None;
    }
    let body_len = declared_body_len(&[prefix[0], prefix[1], prefix[2], prefix[3]]);
    if !(FIXED_BODY_LEN..=max_body_len).contains(&body_len) {
        return None;
    }
    if prefix.len() > HEADER_LEN && prefix[HEADER_LEN] != FRAME_VERSION {
        return None;
    }
    Some(HEADER_LEN + body_len + TRAILER_LEN)
}

/// Decode one frame from the start of `buf`
///
/// Returns the record and the number of bytes consumed. The record's content
/// checksum is not verified here; callers decide what a mismatch means.
pub fn decode(buf: &[u8], max_body_len: usize) -> Result<(Record, usize), FrameError> {
    if buf.len() < HEADER_LEN {
        return Err(FrameError::Incomplete {
            needed: HEADER_LEN,
            available: buf.len(),
        });
    }
    let header = [buf[0], buf[1], buf[2], buf[3]];
    let body_len = declared_body_len(&header);
    if body_len < FIXED_BODY_LEN {
        return Err(FrameError::Corrupt(format!(
            "body length {} below minimum {}",
            body_len, FIXED_BODY_LEN
        )));
    }
    if body_len > max_body_len {
        return Err(FrameError::Corrupt(format!(
            "body length {} exceeds limit {}",
            body_len, max_body_len
        )));
    }

    let total = HEADER_LEN + body_len + TRAILER_LEN;
    if buf.len() < total {
        return Err(FrameError::Incomplete {
            needed: total,
            available: buf.len(),
        });
    }

    let covered = &buf[..HEADER_LEN + body_len];
    let trailer = &buf[HEADER_LEN + body_len..total];
    let stored_crc = u32::from_be_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    if crc32fast::hash(covered) != stored_crc {
        return Err(FrameError::Corrupt("crc mismatch".to_string()));
    }

    let record = decode_body(&covered[HEADER_LEN..])?;
    Ok((record, total))
}

fn decode_body(body: &[u8]) -> Result<Record, FrameError> {
    let mut cursor = Cursor { buf: body, pos: 0 };

    let version = cursor.u8()?;
    if version != FRAME_VERSION {
        return Err(FrameError::Corrupt(format!("unknown version {}", version)));
    }
    let sequence = cursor.u64()?;
    let logical_clock = cursor.u64()?;
    let wall_time_micros = cursor.u64()?;

    let origin_len = cursor.u16()? as usize;
    let origin = std::str::from_utf8(cursor.take(origin_len)?)
        .map_err(|_| FrameError::Corrupt("origin is not utf-8".to_string()))?;
    let origin_id = OriginId::new(origin)
        .map_err(|_| FrameError::Corrupt(format!("invalid origin {:?}", origin)))?;

    let payload_len = cursor.u32()? as usize;
    let payload = cursor.take(payload_len)?.to_vec();

    let mut checksum = [0u8; 32];
    checksum.copy_from_slice(cursor.take(32)?);

    if cursor.pos != body.len() {
        return Err(FrameError::Corrupt(format!(
            "{} trailing body bytes",
            body.len() - cursor.pos
        )));
    }

    Ok(Record {
        sequence,
        origin_id,
        logical_clock,
        wall_time_micros,
        payload,
        checksum: Checksum(checksum),
    })
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], FrameError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| FrameError::Corrupt("inner length overruns body".to_string()))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, FrameError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, FrameError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, FrameError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64, FrameError> {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(self.take(8)?);
        Ok(u64::from_be_bytes(bytes))
    }
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
