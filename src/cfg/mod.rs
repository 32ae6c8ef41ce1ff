//! Ambient configuration structs for the storage and database layers.
//! Each carries a `Default` matching the original engine's constants and a
//! `validate()` enforcing the invariants the engine relies on.

use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;

use crate::error::{MonitorError, MonitorResult};

/// SSTable block compression. Only `None` and `Zstd` have a working codec
/// in this crate; the rest are accepted as configuration values (matching
/// upstream's opaque compression enum) but rejected at `validate()` time
/// rather than silently behaving as `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    None,
    Snappy,
    Lz4,
    Zstd,
    Gzip,
}

impl Compression {
    pub fn is_implemented(self) -> bool {
        matches!(self, Compression::None | Compression::Zstd)
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub wal_directory: PathBuf,
    pub memtable_size_bytes: usize,
    pub max_memtables: usize,
    pub level0_file_num_compaction_trigger: usize,
    pub max_background_compactions: usize,
    pub compression: Compression,
    pub sync_writes: bool,
    pub write_buffer_size: usize,
    pub default_retention: Duration,
    pub block_cache_size_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_directory: PathBuf::from("./tsdb_data"),
            wal_directory: PathBuf::from("./tsdb_wal"),
            memtable_size_bytes: 64 * 1024 * 1024,
            max_memtables: 3,
            level0_file_num_compaction_trigger: 4,
            max_background_compactions: 2,
            compression: Compression::default(),
            sync_writes: false,
            write_buffer_size: 1024 * 1024,
            default_retention: Duration::from_secs(24 * 30 * 3600),
            block_cache_size_bytes: 128 * 1024 * 1024,
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> MonitorResult<()> {
        if self.memtable_size_bytes == 0 {
            return Err(MonitorError::invalid_configuration(
                "memtable_size_bytes must be > 0",
            ));
        }
        if self.max_memtables == 0 {
            return Err(MonitorError::invalid_configuration("max_memtables must be > 0"));
        }
        if self.level0_file_num_compaction_trigger == 0 {
            return Err(MonitorError::invalid_configuration(
                "level0_file_num_compaction_trigger must be > 0",
            ));
        }
        if !self.compression.is_implemented() {
            return Err(MonitorError::invalid_configuration(format!(
                "compression {:?} has no codec in this build",
                self.compression
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartitionStrategy {
    #[default]
    ByMetricName,
    ByTimeWindow,
    ByHash,
    Hybrid,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub partition_strategy: PartitionStrategy,
    pub max_partitions: usize,
    pub partition_size_bytes: usize,
    /// Bucket width for `ByTimeWindow`/`Hybrid` partitioning. Not named in
    /// the distilled spec's option list but required to make those two
    /// strategies concrete; defaults to a one-hour bucket.
    pub partition_time_window: Duration,
    pub write_batch_size: usize,
    pub write_batch_timeout: Duration,
    pub query_cache_size: usize,
    pub compaction_interval: Duration,
    pub retention_check_interval: Duration,
    pub background_workers: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            partition_strategy: PartitionStrategy::ByMetricName,
            max_partitions: 64,
            partition_size_bytes: 256 * 1024 * 1024,
            partition_time_window: Duration::from_secs(3600),
            write_batch_size: 500,
            write_batch_timeout: Duration::from_millis(100),
            query_cache_size: 1000,
            compaction_interval: Duration::from_secs(60),
            retention_check_interval: Duration::from_secs(300),
            background_workers: 1,
        }
    }
}

impl DatabaseConfig {
    pub fn validate(&self) -> MonitorResult<()> {
        if self.max_partitions == 0 {
            return Err(MonitorError::invalid_configuration("max_partitions must be > 0"));
        }
        if self.write_batch_size == 0 {
            return Err(MonitorError::invalid_configuration("write_batch_size must be > 0"));
        }
        Ok(())
    }
}

/// One named retention/downsampling rule. `metric_pattern` is a regex over
/// metric names, matching upstream's documented "regex pattern for
/// metrics"; `None` matches every metric.
#[derive(Debug, Clone)]
pub struct RetentionPolicyConfig {
    pub name: String,
    pub retention_period: Duration,
    pub metric_pattern: Option<Regex>,
    pub tag_filter: Option<(String, String)>,
    pub max_points: Option<usize>,
    pub downsample_on_age: bool,
    pub downsample_after: Duration,
    pub downsample_interval: Duration,
}

impl RetentionPolicyConfig {
    pub fn matches(&self, metric_name: &str, tags: &std::collections::BTreeMap<String, String>) -> bool {
        if let Some(pattern) = &self.metric_pattern {
            if !pattern.is_match(metric_name) {
                return false;
            }
        }
        if let Some((key, value)) = &self.tag_filter {
            if tags.get(key) != Some(value) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unimplemented_compression_is_rejected() {
        let cfg = StorageConfig {
            compression: Compression::Snappy,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zstd_compression_passes_validation() {
        let cfg = StorageConfig {
            compression: Compression::Zstd,
            ..Default::default()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn retention_policy_matches_pattern_and_tag() {
        let policy = RetentionPolicyConfig {
            name: "short-lived-debug".to_string(),
            retention_period: Duration::from_secs(3600),
            metric_pattern: Some(Regex::new("^debug_").unwrap()),
            tag_filter: Some(("env".to_string(), "staging".to_string())),
            max_points: None,
            downsample_on_age: false,
            downsample_after: Duration::ZERO,
            downsample_interval: Duration::ZERO,
        };
        let tags: std::collections::BTreeMap<String, String> =
            [("env".to_string(), "staging".to_string())].into_iter().collect();
        assert!(policy.matches("debug_latency", &tags));
        assert!(!policy.matches("prod_latency", &tags));
    }
}
