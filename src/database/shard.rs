//! Thin fan-out/merge helper for a distributed deployment: writes go to
//! one shard chosen by a caller-supplied key function, queries go to every
//! shard and are merged by timestamp. No network layer — shards are
//! whatever [`MetricDatabase`] handles the caller hands in.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::alert::Labels;
use crate::database::database::MetricDatabase;
use crate::error::MonitorResult;

pub struct ShardCoordinator {
    shards: Vec<Arc<MetricDatabase>>,
    shard_key: Box<dyn Fn(&str) -> usize + Send + Sync>,
}

impl ShardCoordinator {
    pub fn new(
        shards: Vec<Arc<MetricDatabase>>,
        shard_key: impl Fn(&str) -> usize + Send + Sync + 'static,
    ) -> Self {
        Self {
            shards,
            shard_key: Box::new(shard_key),
        }
    }

    fn shard_for(&self, metric_name: &str) -> &Arc<MetricDatabase> {
        let idx = (self.shard_key)(metric_name) % self.shards.len().max(1);
        &self.shards[idx]
    }

    pub fn write(&self, name: &str, value: f64, ts: DateTime<Utc>, tags: Labels) -> MonitorResult<()> {
        self.shard_for(name).write(name, value, ts, tags)
    }

    /// Queries every shard and merges the results by timestamp. A given
    /// metric typically lives on one shard, but nothing prevents the same
    /// name from being written to more than one (e.g. during a
    /// re-sharding), so every shard is always consulted.
    pub fn query(
        &self,
        name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        tag_filter: &Labels,
    ) -> MonitorResult<Vec<(DateTime<Utc>, f64, Labels)>> {
        let mut merged = Vec::new();
        for shard in &self.shards {
            merged.extend(shard.query(name, start, end, tag_filter)?);
        }
        merged.sort_by_key(|(ts, _, _)| *ts);
        Ok(merged)
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::DatabaseConfig;

    fn shard(dir: &std::path::Path) -> Arc<MetricDatabase> {
        Arc::new(
            MetricDatabase::new(DatabaseConfig::default(), dir.to_path_buf(), Vec::new()).unwrap(),
        )
    }

    #[test]
    fn writes_route_by_shard_key_and_queries_merge_all_shards() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let shards = vec![shard(dir_a.path()), shard(dir_b.path())];
        let coordinator = ShardCoordinator::new(shards, |name| if name == "cpu" { 0 } else { 1 });

        let now = Utc::now();
        coordinator.write("cpu", 42.0, now, Labels::new()).unwrap();
        let results = coordinator.query("cpu", now - chrono::Duration::seconds(1), now + chrono::Duration::seconds(1), &Labels::new()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].1, 42.0);
    }
}
