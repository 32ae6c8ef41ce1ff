//! Delta trigger: fires on the change between consecutive values.

use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaMode {
    Absolute,
    Signed,
}

struct Inner {
    previous: Option<f64>,
}

/// Compares each value against the previous one. The first call only seeds
/// state and never fires.
pub struct DeltaTrigger {
    pub threshold: f64,
    pub mode: DeltaMode,
    inner: Mutex<Inner>,
}

impl DeltaTrigger {
    pub fn new(threshold: f64, mode: DeltaMode) -> Self {
        Self {
            threshold,
            mode,
            inner: Mutex::new(Inner { previous: None }),
        }
    }

    pub fn evaluate(&self, value: f64) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let Some(prev) = inner.previous else {
            inner.previous = Some(value);
            return false;
        };
        inner.previous = Some(value);
        match self.mode {
            DeltaMode::Absolute => (value - prev).abs() > self.threshold,
            DeltaMode::Signed => (value - prev) > self.threshold,
        }
    }

    pub fn reset(&self) {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).previous = None;
    }

    pub fn type_name(&self) -> &'static str {
        "delta"
    }

    pub fn description(&self) -> String {
        format!("delta {:?} {}", self.mode, self.threshold)
    }
}
