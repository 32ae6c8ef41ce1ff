//! Maps a metric name to the set of partitions and tag keys it's spread
//! across, plus basic counts, so queries can be planned without asking
//! every partition whether it holds the metric.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::alert::Labels;

#[derive(Debug, Clone)]
pub struct MetricIndexEntry {
    pub partition_ids: HashSet<String>,
    pub tag_keys: HashSet<String>,
    pub count: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

#[derive(Default)]
pub struct MetricIndex {
    entries: RwLock<HashMap<String, MetricIndexEntry>>,
}

impl MetricIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, name: &str, partition_id: &str, tags: &Labels, ts: DateTime<Utc>) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let entry = entries.entry(name.to_string()).or_insert_with(|| MetricIndexEntry {
            partition_ids: HashSet::new(),
            tag_keys: HashSet::new(),
            count: 0,
            first_seen: ts,
            last_seen: ts,
        });
        entry.partition_ids.insert(partition_id.to_string());
        entry.tag_keys.extend(tags.keys().cloned());
        entry.count += 1;
        entry.last_seen = ts;
    }

    pub fn partitions_for(&self, name: &str) -> HashSet<String> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .map(|e| e.partition_ids.clone())
            .unwrap_or_default()
    }

    pub fn metric_names(&self) -> Vec<String> {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).keys().cloned().collect()
    }

    pub fn entry(&self, name: &str) -> Option<MetricIndexEntry> {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_accumulates_partitions_and_tag_keys() {
        let idx = MetricIndex::new();
        let now = Utc::now();
        let tags: Labels = [("host".to_string(), "a".to_string())].into_iter().collect();
        idx.record("cpu", "p0", &tags, now);
        idx.record("cpu", "p1", &Labels::new(), now + chrono::Duration::seconds(1));
        let entry = idx.entry("cpu").unwrap();
        assert_eq!(entry.count, 2);
        assert_eq!(entry.partition_ids.len(), 2);
        assert!(entry.tag_keys.contains("host"));
    }
}
