//! Cumulative bucketed histogram.

use std::sync::Mutex;

/// Standard bucket boundaries, matching common latency-histogram defaults.
pub const STANDARD_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0, 7.5, 10.0,
];

#[derive(Debug, Clone, Copy)]
pub struct Bucket {
    pub upper_bound: f64,
    pub count: u64,
}

struct Inner {
    buckets: Vec<Bucket>,
    sum: f64,
    total_count: u64,
}

/// Fixed-bucket cumulative histogram: each sample increments every bucket
/// whose `upper_bound >= value`, plus an implicit `+inf` bucket that always
/// matches. `total_count` always equals the `+inf` bucket's count.
pub struct Histogram {
    inner: Mutex<Inner>,
}

impl Histogram {
    /// Build a histogram from explicit, ascending bucket bounds. An
    /// implicit `+inf` bucket is appended automatically.
    pub fn new(bounds: &[f64]) -> Self {
        let mut buckets: Vec<Bucket> = bounds
            .iter()
            .map(|&b| Bucket {
                upper_bound: b,
                count: 0,
            })
            .collect();
        buckets.push(Bucket {
            upper_bound: f64::INFINITY,
            count: 0,
        });
        Self {
            inner: Mutex::new(Inner {
                buckets,
                sum: 0.0,
                total_count: 0,
            }),
        }
    }

    pub fn standard() -> Self {
        Self::new(STANDARD_BUCKETS)
    }

    pub fn observe(&self, value: f64) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        for bucket in &mut inner.buckets {
            if value <= bucket.upper_bound {
                bucket.count += 1;
            }
        }
        inner.sum += value;
        inner.total_count += 1;
    }

    pub fn buckets(&self) -> Vec<Bucket> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).buckets.clone()
    }

    pub fn sum(&self) -> f64 {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).sum
    }

    pub fn total_count(&self) -> u64 {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .total_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cumulative_counts_are_nondecreasing() {
        let h = Histogram::standard();
        for v in [0.001, 0.02, 0.06, 0.3, 3.0, 20.0] {
            h.observe(v);
        }
        let buckets = h.buckets();
        for w in buckets.windows(2) {
            assert!(w[0].count <= w[1].count);
        }
        assert_eq!(buckets.last().unwrap().count, h.total_count());
        assert_eq!(h.total_count(), 6);
    }

    #[test]
    fn sum_tracks_observations() {
        let h = Histogram::standard();
        h.observe(1.0);
        h.observe(2.0);
        assert_eq!(h.sum(), 3.0);
    }
}
