// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction for testable time handling.
//!
//! Timestamps are `chrono::DateTime<Utc>` in-process and POSIX epoch
//! seconds (f64) on the wire.

use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use std::sync::Arc;

/// A clock that provides the current time.
pub trait Clock: Clone + Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// Real system clock.
#[derive(Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fake clock for testing with controllable time.
#[derive(Clone)]
pub struct FakeClock {
    current: Arc<Mutex<DateTime<Utc>>>,
}

impl FakeClock {
    pub fn new() -> Self {
        // Arbitrary fixed origin so tests are reproducible.
        let origin = Utc.timestamp_opt(1_000_000, 0).single().unwrap_or_else(Utc::now);
        Self { current: Arc::new(Mutex::new(origin)) }
    }

    /// Advance the clock by the given duration.
    pub fn advance(&self, duration: Duration) {
        *self.current.lock() += duration;
    }

    /// Set the clock to a specific instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.current.lock() = instant;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock()
    }
}

/// Convert a timestamp to POSIX epoch seconds for transport.
pub fn epoch_seconds(timestamp: DateTime<Utc>) -> f64 {
    timestamp.timestamp() as f64 + f64::from(timestamp.timestamp_subsec_micros()) / 1e6
}

/// Convert POSIX epoch seconds back to a timestamp.
///
/// Out-of-range values clamp to the epoch rather than failing: a bad
/// timestamp should deprioritize an operation, not wedge the queue.
pub fn from_epoch_seconds(seconds: f64) -> DateTime<Utc> {
    let secs = seconds.floor() as i64;
    let micros = ((seconds - seconds.floor()) * 1e6).round() as u32;
    Utc.timestamp_opt(secs, micros * 1000)
        .single()
        .unwrap_or_else(|| Utc.timestamp_opt(0, 0).single().unwrap_or_else(Utc::now))
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
