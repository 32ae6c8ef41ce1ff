//! In-memory mutable write buffer. One active memtable takes every write;
//! once it is sealed it becomes immutable and queues for a flush to an
//! SSTable.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alert::Labels;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaggedPoint {
    pub value: f64,
    pub tags: Labels,
}

/// Roughly accounts for a point's footprint: 8 bytes for the timestamp key
/// plus the f64 value plus each tag's key/value bytes.
fn point_size(tags: &Labels) -> usize {
    16 + tags.iter().map(|(k, v)| k.len() + v.len()).sum::<usize>()
}

pub struct Memtable {
    data: RwLock<BTreeMap<String, BTreeMap<DateTime<Utc>, TaggedPoint>>>,
    size_bytes: AtomicUsize,
    pub created_at: Instant,
}

impl Memtable {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            size_bytes: AtomicUsize::new(0),
            created_at: Instant::now(),
        }
    }

    pub fn insert(&self, series_id: &str, ts: DateTime<Utc>, value: f64, tags: Labels) {
        let added = point_size(&tags) + series_id.len();
        let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
        data.entry(series_id.to_string())
            .or_default()
            .insert(ts, TaggedPoint { value, tags });
        self.size_bytes.fetch_add(added, Ordering::Relaxed);
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes.load(Ordering::Relaxed)
    }

    pub fn is_full(&self, max_size: usize, max_age: std::time::Duration) -> bool {
        self.size_bytes() >= max_size || self.created_at.elapsed() >= max_age
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().unwrap_or_else(|e| e.into_inner()).is_empty()
    }

    pub fn read_range(
        &self,
        series_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<(DateTime<Utc>, f64, Labels)> {
        let data = self.data.read().unwrap_or_else(|e| e.into_inner());
        data.get(series_id)
            .map(|points| {
                points
                    .range(start..=end)
                    .map(|(ts, p)| (*ts, p.value, p.tags.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn series_ids(&self) -> Vec<String> {
        self.data.read().unwrap_or_else(|e| e.into_inner()).keys().cloned().collect()
    }

    pub fn delete_before(&self, before: DateTime<Utc>) -> usize {
        let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
        let mut removed = 0;
        for points in data.values_mut() {
            let to_remove: Vec<DateTime<Utc>> =
                points.range(..before).map(|(ts, _)| *ts).collect();
            for ts in to_remove {
                points.remove(&ts);
                removed += 1;
            }
        }
        data.retain(|_, points| !points.is_empty());
        removed
    }

    pub fn snapshot(&self) -> BTreeMap<String, BTreeMap<DateTime<Utc>, TaggedPoint>> {
        self.data.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Default for Memtable {
    fn default() -> Self {
        Self::new()
    }
}
