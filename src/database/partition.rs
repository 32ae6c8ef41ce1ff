//! A partition wraps exactly one [`TimeSeriesEngine`] instance and becomes
//! read-only once it rolls over to a fresh successor.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::alert::Labels;
use crate::cfg::{PartitionStrategy, StorageConfig};
use crate::error::MonitorResult;
use crate::tsengine::TimeSeriesEngine;

pub struct Partition {
    pub id: String,
    pub engine: Arc<TimeSeriesEngine>,
    readonly: AtomicBool,
    bytes_written: AtomicU64,
    pub created_at: Instant,
}

impl Partition {
    pub fn new(id: impl Into<String>, storage_config: StorageConfig) -> MonitorResult<Arc<Self>> {
        let engine = TimeSeriesEngine::new(storage_config)?;
        Ok(Arc::new(Self {
            id: id.into(),
            engine,
            readonly: AtomicBool::new(false),
            bytes_written: AtomicU64::new(0),
            created_at: Instant::now(),
        }))
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly.load(Ordering::SeqCst)
    }

    pub fn mark_readonly(&self) {
        self.readonly.store(true, Ordering::SeqCst);
    }

    pub fn record_write(&self, approx_bytes: u64) {
        self.bytes_written.fetch_add(approx_bytes, Ordering::Relaxed);
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    /// Whether this partition should roll over: past its size cap, or
    /// past the configured age window.
    pub fn should_roll_over(&self, max_bytes: u64, max_age: std::time::Duration) -> bool {
        self.bytes_written() >= max_bytes || self.created_at.elapsed() >= max_age
    }
}

/// Computes the partition id a sample belongs to under a given strategy.
/// `ByTimeWindow` and `Hybrid` bucket on the sample's wallclock timestamp
/// using `time_window`; `ByHash` hashes the series fingerprint modulo
/// `max_partitions`.
pub fn partition_id_for(
    strategy: PartitionStrategy,
    metric_name: &str,
    tags: &Labels,
    ts: chrono::DateTime<chrono::Utc>,
    time_window: std::time::Duration,
    max_partitions: usize,
) -> String {
    let window_bucket = || {
        let window_ms = time_window.as_millis().max(1) as i64;
        ts.timestamp_millis() / window_ms
    };
    match strategy {
        PartitionStrategy::ByMetricName => metric_name.to_string(),
        PartitionStrategy::ByTimeWindow => format!("window-{}", window_bucket()),
        PartitionStrategy::ByHash => {
            let fp = crate::alert::fingerprint(metric_name, tags);
            let hash = hash_str(&fp) as usize % max_partitions.max(1);
            format!("hash-{hash}")
        }
        PartitionStrategy::Hybrid => format!("{metric_name}-window-{}", window_bucket()),
    }
}

fn hash_str(s: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    s.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn by_metric_name_uses_the_name_verbatim() {
        let id = partition_id_for(
            PartitionStrategy::ByMetricName,
            "cpu_usage",
            &Labels::new(),
            chrono::Utc::now(),
            std::time::Duration::from_secs(3600),
            64,
        );
        assert_eq!(id, "cpu_usage");
    }

    #[test]
    fn by_hash_is_stable_for_equal_inputs() {
        let now = chrono::Utc::now();
        let a = partition_id_for(PartitionStrategy::ByHash, "cpu", &Labels::new(), now, std::time::Duration::from_secs(1), 8);
        let b = partition_id_for(PartitionStrategy::ByHash, "cpu", &Labels::new(), now, std::time::Duration::from_secs(1), 8);
        assert_eq!(a, b);
    }

    #[test]
    fn roll_over_triggers_on_size_cap() {
        let dir = tempfile::tempdir().unwrap();
        let partition = Partition::new(
            "p1",
            StorageConfig {
                data_directory: dir.path().join("data"),
                wal_directory: dir.path().join("wal"),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(!partition.should_roll_over(100, std::time::Duration::from_secs(3600)));
        partition.record_write(200);
        assert!(partition.should_roll_over(100, std::time::Duration::from_secs(3600)));
    }
}
