//! Monotonic counter primitive.

use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically increasing count. Never decreases.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, delta: u64) {
        self.value.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.value.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increments_and_adds() {
        let c = Counter::new();
        c.increment();
        c.add(41);
        assert_eq!(c.get(), 42);
    }

    #[test]
    fn resets_to_zero() {
        let c = Counter::new();
        c.add(10);
        c.reset();
        assert_eq!(c.get(), 0);
    }
}
