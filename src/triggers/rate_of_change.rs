//! Rate-of-change trigger: fires on the slope of a sliding window of samples.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDirection {
    Increasing,
    Decreasing,
    Either,
}

struct Inner {
    samples: VecDeque<(Instant, f64)>,
}

/// Keeps a sliding window of `(monotonic instant, value)` pairs and fires
/// when the ordinary-least-squares slope over the window, scaled by the
/// window width, crosses `rate_threshold` in the configured direction.
pub struct RateOfChangeTrigger {
    window: Duration,
    min_samples: usize,
    rate_threshold: f64,
    direction: RateDirection,
    inner: Mutex<Inner>,
}

impl RateOfChangeTrigger {
    pub fn new(
        window: Duration,
        min_samples: usize,
        rate_threshold: f64,
        direction: RateDirection,
    ) -> Self {
        Self {
            window,
            min_samples: min_samples.max(2),
            rate_threshold,
            direction,
            inner: Mutex::new(Inner {
                samples: VecDeque::new(),
            }),
        }
    }

    pub fn evaluate(&self, value: f64, now: Instant) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.samples.push_back((now, value));
        while let Some(&(ts, _)) = inner.samples.front() {
            if now.duration_since(ts) > self.window {
                inner.samples.pop_front();
            } else {
                break;
            }
        }
        if inner.samples.len() < self.min_samples {
            return false;
        }

        let Some(&(first_ts, _)) = inner.samples.front() else {
            return false;
        };
        let n = inner.samples.len() as f64;
        let (mut sum_x, mut sum_y, mut sum_xy, mut sum_xx) = (0.0, 0.0, 0.0, 0.0);
        for &(ts, v) in &inner.samples {
            let x = ts.duration_since(first_ts).as_secs_f64() * 1000.0;
            sum_x += x;
            sum_y += v;
            sum_xy += x * v;
            sum_xx += x * x;
        }
        let denom = n * sum_xx - sum_x * sum_x;
        if denom.abs() < f64::EPSILON {
            return false;
        }
        let slope = (n * sum_xy - sum_x * sum_y) / denom;
        let window_ms = self.window.as_secs_f64() * 1000.0;
        let rate = slope * window_ms;

        match self.direction {
            RateDirection::Increasing => rate > self.rate_threshold,
            RateDirection::Decreasing => rate < -self.rate_threshold,
            RateDirection::Either => rate.abs() > self.rate_threshold,
        }
    }

    pub fn reset(&self) {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).samples.clear();
    }

    pub fn type_name(&self) -> &'static str {
        "rate_of_change"
    }

    pub fn description(&self) -> String {
        format!(
            "rate {:?} {} per {:?}",
            self.direction, self.rate_threshold, self.window
        )
    }
}
