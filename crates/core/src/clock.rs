// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstractions: wall time for audit fields, Lamport time for ordering

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// A clock that provides the current time
pub trait Clock: Clone + Send + Sync {
    /// Monotonic time, used for timeouts and backoff
    fn now(&self) -> Instant;

    /// Wall-clock microseconds since the Unix epoch (advisory only)
    fn wall_micros(&self) -> u64;
}

/// Real system clock
#[derive(Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall_micros(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0)
    }
}

/// Fake clock for testing with controllable time
#[derive(Clone)]
pub struct FakeClock {
    current: Arc<Mutex<(Instant, u64)>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            current: Arc::new(Mutex::new((Instant::now(), 1_700_000_000_000_000))),
        }
    }

    /// Advance the clock by the given duration
    pub fn advance(&self, duration: Duration) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        current.0 += duration;
        current.1 += duration.as_micros() as u64;
    }

    /// Set the wall time to a specific value
    pub fn set_wall_micros(&self, micros: u64) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        current.1 = micros;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.current.lock().unwrap_or_else(|e| e.into_inner()).0
    }

    fn wall_micros(&self) -> u64 {
        self.current.lock().unwrap_or_else(|e| e.into_inner()).1
    }
}

/// Lamport counter for causal ordering across origins
///
/// Advanced by one on every local event; on receipt of foreign records it
/// first jumps to the highest clock observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct LamportClock(u64);

impl LamportClock {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Current value without advancing
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Advance for a local event and return the new value
    pub fn tick(&mut self) -> u64 {
        self.0 += 1;
        self.0
    }

    /// Fold in a clock value seen on another record
    pub fn observe(&mut self, seen: u64) {
        self.0 = self.0.max(seen);
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
