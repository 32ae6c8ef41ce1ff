//! Anomaly (z-score) trigger: flags values far from a rolling baseline.

use std::collections::VecDeque;
use std::sync::Mutex;

use statrs::statistics::Statistics;

const DEFAULT_HISTORY_SIZE: usize = 100;
const DEFAULT_MIN_SAMPLES: usize = 10;
const DEFAULT_SENSITIVITY: f64 = 3.0;
const DEGENERATE_STDDEV: f64 = 1e-10;

struct Inner {
    history: VecDeque<f64>,
}

/// Bounded FIFO baseline with sample (n-1) standard deviation. Values more
/// than `sensitivity` sample-stddevs from the rolling mean are flagged as
/// anomalous, once enough history exists.
pub struct AnomalyTrigger {
    history_size: usize,
    min_samples: usize,
    sensitivity: f64,
    inner: Mutex<Inner>,
}

impl AnomalyTrigger {
    pub fn new(history_size: usize, min_samples: usize, sensitivity: f64) -> Self {
        Self {
            history_size: history_size.max(1),
            min_samples: min_samples.max(2),
            sensitivity,
            inner: Mutex::new(Inner {
                history: VecDeque::new(),
            }),
        }
    }

    pub fn evaluate(&self, value: f64) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        let fired = if inner.history.len() >= self.min_samples {
            // Sample (n-1) mean/stddev over the current baseline window.
            let data: Vec<f64> = inner.history.iter().copied().collect();
            let mean = data.clone().mean();
            let stddev = data.std_dev();
            if stddev < DEGENERATE_STDDEV {
                false
            } else {
                (value - mean).abs() / stddev > self.sensitivity
            }
        } else {
            false
        };

        inner.history.push_back(value);
        if inner.history.len() > self.history_size {
            inner.history.pop_front();
        }

        fired
    }

    pub fn reset(&self) {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).history.clear();
    }

    pub fn type_name(&self) -> &'static str {
        "anomaly"
    }

    pub fn description(&self) -> String {
        format!("z-score beyond {} sigma", self.sensitivity)
    }
}

impl Default for AnomalyTrigger {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_SIZE, DEFAULT_MIN_SAMPLES, DEFAULT_SENSITIVITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_stddev_never_fires() {
        let t = AnomalyTrigger::new(100, 10, 3.0);
        for _ in 0..15 {
            assert!(!t.evaluate(50.0));
        }
    }

    #[test]
    fn spike_after_stable_baseline_fires() {
        let t = AnomalyTrigger::new(100, 10, 3.0);
        // A fixed, low-variance baseline around 50.
        let baseline = [
            48.0, 52.0, 49.0, 51.0, 50.0, 47.0, 53.0, 50.0, 49.0, 51.0, 50.0, 48.0, 52.0, 49.0,
            51.0, 50.0, 47.0, 53.0, 50.0, 49.0,
        ];
        for v in baseline {
            t.evaluate(v);
        }
        assert!(t.evaluate(200.0));
    }
}
