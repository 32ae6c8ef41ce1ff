//! Absent trigger: detects a metric going silent for too long.

use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Inner {
    last_seen: Option<Instant>,
}

/// Fires when the gap between the previously recorded `now` and the
/// current `now` exceeds `max_silence`. The first call only seeds state.
pub struct AbsentTrigger {
    max_silence: Duration,
    inner: Mutex<Inner>,
}

impl AbsentTrigger {
    pub fn new(max_silence: Duration) -> Self {
        Self {
            max_silence,
            inner: Mutex::new(Inner { last_seen: None }),
        }
    }

    pub fn evaluate(&self, now: Instant) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let Some(prev) = inner.last_seen else {
            inner.last_seen = Some(now);
            return false;
        };
        inner.last_seen = Some(now);
        now.duration_since(prev) > self.max_silence
    }

    pub fn reset(&self) {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).last_seen = None;
    }

    pub fn type_name(&self) -> &'static str {
        "absent"
    }

    pub fn description(&self) -> String {
        format!("silent for more than {:?}", self.max_silence)
    }
}
