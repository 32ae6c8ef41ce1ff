//! Gauge primitive: a value that can move up or down.

use std::sync::atomic::{AtomicU64, Ordering};

/// A point-in-time value, stored as bit-punned `f64` for lock-free access.
#[derive(Debug)]
pub struct Gauge {
    bits: AtomicU64,
}

impl Default for Gauge {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl Gauge {
    pub fn new(initial: f64) -> Self {
        Self {
            bits: AtomicU64::new(initial.to_bits()),
        }
    }

    pub fn set(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }

    pub fn add(&self, delta: f64) {
        // Compare-and-swap loop; gauges are low-contention so this is fine.
        loop {
            let current = self.bits.load(Ordering::Relaxed);
            let new = (f64::from_bits(current) + delta).to_bits();
            if self
                .bits
                .compare_exchange_weak(current, new, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }
        }
    }

    pub fn sub(&self, delta: f64) {
        self.add(-delta);
    }
}
