//! Monotonic and wallclock time abstractions.
//!
//! The specification calls out mixed unit conventions (steady vs. system
//! clocks, µs vs. ms) as a design smell to fix. This module adopts exactly
//! two time types: [`Instant`]-backed durations for anything interval-based
//! (cooldowns, `for_duration`, adaptation timing) and [`chrono::DateTime<Utc>`]
//! for anything persisted (alert timestamps, sstable min/max, WAL records).
//! A [`Clock`] trait lets tests substitute a fake monotonic source so
//! interval-based assertions don't depend on wall-clock sleeps.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

/// Source of monotonic "now" for interval timing.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Real wall clock, backed by `Instant::now()`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Deterministic clock for tests: starts at an arbitrary epoch and only
/// advances when [`FakeClock::advance`] is called.
#[derive(Clone)]
pub struct FakeClock {
    epoch: Instant,
    offset_ms: Arc<AtomicU64>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            offset_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset_ms
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.epoch + Duration::from_millis(self.offset_ms.load(Ordering::SeqCst))
    }
}

/// Current wallclock timestamp, used for anything persisted or serialized.
pub fn wallclock_now() -> DateTime<Utc> {
    Utc::now()
}
