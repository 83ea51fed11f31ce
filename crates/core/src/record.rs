// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log record with content checksum
//!
//! The checksum covers `(origin_id, sequence, logical_clock, payload)` and
//! doubles as the record's content identity for deduplication and fork
//! detection. `wall_time_micros` is advisory and deliberately not covered.

use crate::id::{OriginId, RecordId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 content checksum of a record
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Checksum(pub [u8; 32]);

impl Checksum {
    /// Compute the checksum for the covered record fields
    pub fn compute(origin: &OriginId, sequence: u64, logical_clock: u64, payload: &[u8]) -> Self {
        let origin = origin.as_str().as_bytes();
        let mut hasher = Sha256::new();
        hasher.update((origin.len() as u16).to_be_bytes());
        hasher.update(origin);
        hasher.update(sequence.to_be_bytes());
        hasher.update(logical_clock.to_be_bytes());
        hasher.update((payload.len() as u64).to_be_bytes());
        hasher.update(payload);
        Self(hasher.finalize().into())
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Parse a 64-character lowercase or uppercase hex string
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 64 || !hex.is_ascii() {
            return None;
        }
        let mut bytes = [0u8; 32];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(Self(bytes))
    }

    /// Abbreviated form for log lines
    pub fn short(&self) -> String {
        self.to_hex()[..12].to_string()
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum({})", self.short())
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Checksum {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Checksum {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Checksum::from_hex(&hex)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid checksum: {}", hex)))
    }
}

/// A single immutable entry in the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Per-origin sequence, starting at 1
    pub sequence: u64,
    /// Node that created the record
    pub origin_id: OriginId,
    /// Lamport time at creation
    pub logical_clock: u64,
    /// Capture time, microseconds since Unix epoch (display/audit only)
    pub wall_time_micros: u64,
    /// Opaque caller content
    pub payload: Vec<u8>,
    /// Content checksum over origin, sequence, clock and payload
    pub checksum: Checksum,
}

impl Record {
    /// Create a record with a freshly computed checksum
    pub fn new(
        origin_id: OriginId,
        sequence: u64,
        logical_clock: u64,
        wall_time_micros: u64,
        payload: Vec<u8>,
    ) -> Self {
        let checksum = Checksum::compute(&origin_id, sequence, logical_clock, &payload);
        Self {
            sequence,
            origin_id,
            logical_clock,
            wall_time_micros,
            payload,
            checksum,
        }
    }

    /// Recompute the checksum and compare with the stored one
    pub fn verify(&self) -> bool {
        self.checksum
            == Checksum::compute(
                &self.origin_id,
                self.sequence,
                self.logical_clock,
                &self.payload,
            )
    }

    pub fn id(&self) -> RecordId {
        RecordId::new(self.origin_id.clone(), self.sequence)
    }

    /// Canonical merge order: clock, then origin, then sequence, then checksum
    pub fn order_key(&self) -> (u64, &OriginId, u64, &Checksum) {
        (
            self.logical_clock,
            &self.origin_id,
            self.sequence,
            &self.checksum,
        )
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
