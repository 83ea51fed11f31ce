// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-origin sync watermarks

use crate::id::{OriginId, RecordId};
use crate::record::Record;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Highest sequence seen per origin
///
/// An origin that is absent has watermark 0, i.e. nothing covered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Watermark(BTreeMap<OriginId, u64>);

impl Watermark {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, origin: &OriginId) -> u64 {
        self.0.get(origin).copied().unwrap_or(0)
    }

    /// Raise the mark for `origin`; never lowers it
    ///
    /// Returns whether the mark moved.
    pub fn advance(&mut self, origin: &OriginId, sequence: u64) -> bool {
        if sequence <= self.get(origin) {
            return false;
        }
        self.0.insert(origin.clone(), sequence);
        true
    }

    /// Raise the mark to cover a record
    pub fn observe(&mut self, record: &Record) -> bool {
        self.advance(&record.origin_id, record.sequence)
    }

    pub fn covers(&self, id: &RecordId) -> bool {
        id.sequence <= self.get(&id.origin)
    }

    pub fn covers_record(&self, record: &Record) -> bool {
        record.sequence <= self.get(&record.origin_id)
    }

    /// Pointwise maximum
    pub fn join(&self, other: &Watermark) -> Watermark {
        let mut joined = self.clone();
        for (origin, seq) in &other.0 {
            joined.advance(origin, *seq);
        }
        joined
    }

    /// Pointwise minimum over origins known to both
    pub fn meet(&self, other: &Watermark) -> Watermark {
        let met = self
            .0
            .iter()
            .filter_map(|(origin, seq)| {
                other
                    .0
                    .get(origin)
                    .map(|theirs| (origin.clone(), (*seq).min(*theirs)))
            })
            .filter(|(_, seq)| *seq > 0)
            .collect();
        Watermark(met)
    }

    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a Record>) -> Self {
        let mut mark = Watermark::new();
        for record in records {
            mark.observe(record);
        }
        mark
    }

    /// Whether every mark in `self` is at or below `other`
    pub fn is_covered_by(&self, other: &Watermark) -> bool {
        self.0.iter().all(|(origin, seq)| *seq <= other.get(origin))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OriginId, u64)> {
        self.0.iter().map(|(origin, seq)| (origin, *seq))
    }
}

impl FromIterator<(OriginId, u64)> for Watermark {
    fn from_iter<I: IntoIterator<Item = (OriginId, u64)>>(iter: I) -> Self {
        let mut mark = Watermark::new();
        for (origin, seq) in iter {
            mark.advance(&origin, seq);
        }
        mark
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "{{}}");
        }
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(origin, seq)| format!("{}:{}", origin, seq))
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

#[cfg(test)]
#[path = "watermark_tests.rs"]
mod tests;
