//! Timer with bounded reservoir sampling and percentile queries.

use std::sync::Mutex;
use std::time::Instant;

use rand::Rng;

const DEFAULT_RESERVOIR_SIZE: usize = 1024;

struct Inner {
    samples: Vec<f64>,
    sorted: bool,
    total_count: u64,
    sum: f64,
    min: f64,
    max: f64,
}

impl Inner {
    fn new() -> Self {
        Self {
            samples: Vec::new(),
            sorted: true,
            total_count: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    fn ensure_sorted(&mut self) {
        if !self.sorted {
            self.samples
                .sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            self.sorted = true;
        }
    }
}

/// Records durations (milliseconds, as `f64`) into a fixed-size reservoir
/// using reservoir sampling, so the retained sample set stays a uniform
/// representative of the whole stream rather than just the most recent
/// window.
pub struct Timer {
    inner: Mutex<Inner>,
    reservoir_size: usize,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new(DEFAULT_RESERVOIR_SIZE)
    }
}

impl Timer {
    pub fn new(reservoir_size: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::new()),
            reservoir_size: reservoir_size.max(1),
        }
    }

    pub fn record(&self, value_ms: f64) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.total_count += 1;
        inner.sum += value_ms;
        inner.min = inner.min.min(value_ms);
        inner.max = inner.max.max(value_ms);

        if inner.samples.len() < self.reservoir_size {
            inner.samples.push(value_ms);
            inner.sorted = false;
        } else {
            let idx = rand::thread_rng().gen_range(0..inner.total_count as usize);
            if idx < self.reservoir_size {
                inner.samples[idx] = value_ms;
                inner.sorted = false;
            }
        }
    }

    pub fn count(&self) -> u64 {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).total_count
    }

    pub fn reservoir_len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .samples
            .len()
    }

    pub fn sum(&self) -> f64 {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).sum
    }

    pub fn min(&self) -> f64 {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).min
    }

    pub fn max(&self) -> f64 {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).max
    }

    pub fn mean(&self) -> f64 {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.total_count == 0 {
            0.0
        } else {
            inner.sum / inner.total_count as f64
        }
    }

    /// Population standard deviation over the reservoir (not the full
    /// stream — the reservoir is the representative sample we have).
    pub fn stddev(&self) -> f64 {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.ensure_sorted();
        if inner.samples.is_empty() {
            return 0.0;
        }
        let mean = inner.samples.iter().sum::<f64>() / inner.samples.len() as f64;
        let variance = inner
            .samples
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum::<f64>()
            / inner.samples.len() as f64;
        variance.sqrt()
    }

    /// Percentile in `[0, 100]`, linearly interpolated between the two
    /// nearest reservoir ranks.
    pub fn percentile(&self, p: f64) -> f64 {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.ensure_sorted();
        if inner.samples.is_empty() {
            return 0.0;
        }
        if p <= 0.0 {
            return inner.min;
        }
        if p >= 100.0 {
            return inner.max;
        }
        let n = inner.samples.len();
        let rank = (p / 100.0) * (n as f64 - 1.0);
        let lo = rank.floor() as usize;
        let frac = rank - rank.floor();
        let hi = (lo + 1).min(n - 1);
        inner.samples[lo] + (inner.samples[hi] - inner.samples[lo]) * frac
    }

    pub fn p50(&self) -> f64 {
        self.percentile(50.0)
    }
    pub fn p90(&self) -> f64 {
        self.percentile(90.0)
    }
    pub fn p95(&self) -> f64 {
        self.percentile(95.0)
    }
    pub fn p99(&self) -> f64 {
        self.percentile(99.0)
    }
    pub fn p999(&self) -> f64 {
        self.percentile(99.9)
    }

    pub fn reset(&self) {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner()) = Inner::new();
    }
}

/// RAII-style scoped timer: records elapsed milliseconds into a shared
/// [`Timer`] when dropped.
pub struct ScopedTimer<'a> {
    timer: &'a Timer,
    start: Instant,
}

impl<'a> ScopedTimer<'a> {
    pub fn new(timer: &'a Timer) -> Self {
        Self {
            timer,
            start: Instant::now(),
        }
    }
}

impl Drop for ScopedTimer<'_> {
    fn drop(&mut self) {
        let elapsed_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        self.timer.record(elapsed_ms);
    }
}
