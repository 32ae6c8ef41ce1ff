//! Test doubles shared between in-crate unit tests and the integration
//! suite under `tests/`. Gated behind the `test-utils` feature so
//! downstream crates opting into it can reuse the same doubles rather than
//! hand-rolling their own.

use std::collections::HashMap;
use std::sync::Mutex;

pub use crate::clock::FakeClock;

use crate::provider::MetricProvider;

/// A metric provider backed by a plain map, updatable between ticks. Unlike
/// [`crate::provider::ClosureMetricProvider`] this lets a test push new
/// values without recreating the provider or capturing a mutable closure.
#[derive(Default)]
pub struct FakeMetricProvider {
    values: Mutex<HashMap<String, f64>>,
}

impl FakeMetricProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, metric_name: impl Into<String>, value: f64) {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(metric_name.into(), value);
    }

    pub fn clear(&self, metric_name: &str) {
        self.values.lock().unwrap_or_else(|e| e.into_inner()).remove(metric_name);
    }
}

impl MetricProvider for FakeMetricProvider {
    fn value_for(&self, metric_name: &str) -> Option<f64> {
        self.values.lock().unwrap_or_else(|e| e.into_inner()).get(metric_name).copied()
    }
}
