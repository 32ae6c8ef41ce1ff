//! Metric primitives: counters, gauges, histograms, summaries and timers.

mod counter;
mod gauge;
mod histogram;
mod record;
mod summary;
mod timer;

pub use counter::Counter;
pub use gauge::Gauge;
pub use histogram::{Bucket, Histogram, STANDARD_BUCKETS};
pub use record::{MetricKind, MetricRecord, SampleValue};
pub use summary::Summary;
pub use timer::{ScopedTimer, Timer};
