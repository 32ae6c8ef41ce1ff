//! Applies a retention/downsampling policy to one partition's engine.

use chrono::Utc;

use crate::cfg::RetentionPolicyConfig;
use crate::database::partition::Partition;
use crate::error::MonitorResult;
use crate::tsengine::AggregationFn;

/// Deletes points older than `policy.retention_period`, and, if
/// `downsample_on_age` is set, first rewrites points older than
/// `downsample_after` into fixed `downsample_interval` averaged buckets
/// before the hard retention cutoff removes anything older still.
pub fn apply_retention(policy: &RetentionPolicyConfig, partition: &Partition, metric_name: &str) -> MonitorResult<usize> {
    let now = Utc::now();
    let retention_cutoff = now - chrono::Duration::from_std(policy.retention_period).unwrap_or(chrono::Duration::zero());

    if policy.downsample_on_age {
        let downsample_cutoff =
            now - chrono::Duration::from_std(policy.downsample_after).unwrap_or(chrono::Duration::zero());
        if downsample_cutoff > retention_cutoff {
            let interval = chrono::Duration::from_std(policy.downsample_interval).unwrap_or(chrono::Duration::seconds(60));
            let buckets = partition.engine.aggregate(
                metric_name,
                retention_cutoff,
                downsample_cutoff,
                &crate::alert::Labels::new(),
                interval,
                AggregationFn::Avg,
            )?;
            partition.engine.delete_before(downsample_cutoff)?;
            for (ts, value) in buckets {
                partition.engine.write(metric_name, value, ts, crate::alert::Labels::new())?;
            }
        }
    }

    partition.engine.delete_before(retention_cutoff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::StorageConfig;
    use std::time::Duration;

    fn test_partition(dir: &std::path::Path) -> std::sync::Arc<Partition> {
        Partition::new(
            "p0",
            StorageConfig {
                data_directory: dir.join("data"),
                wal_directory: dir.join("wal"),
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn retention_removes_points_past_the_cutoff() {
        let dir = tempfile::tempdir().unwrap();
        let partition = test_partition(dir.path());
        let now = Utc::now();
        partition.engine.write("cpu", 1.0, now - chrono::Duration::days(10), crate::alert::Labels::new()).unwrap();
        partition.engine.write("cpu", 2.0, now, crate::alert::Labels::new()).unwrap();

        let policy = RetentionPolicyConfig {
            name: "short".to_string(),
            retention_period: Duration::from_secs(24 * 3600),
            metric_pattern: None,
            tag_filter: None,
            max_points: None,
            downsample_on_age: false,
            downsample_after: Duration::ZERO,
            downsample_interval: Duration::ZERO,
        };
        let removed = apply_retention(&policy, &partition, "cpu").unwrap();
        assert_eq!(removed, 1);
    }
}
