//! Tag-indexed lookup from a metric name (plus an optional tag filter) to
//! the set of series it covers, so `query` doesn't need to scan every
//! series in the engine.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use crate::alert::Labels;

#[derive(Default)]
pub struct TagIndex {
    by_name: RwLock<HashMap<String, HashSet<String>>>,
    tags_by_series: RwLock<HashMap<String, Labels>>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, name: &str, series_id: &str, tags: &Labels) {
        self.by_name
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(name.to_string())
            .or_default()
            .insert(series_id.to_string());
        self.tags_by_series
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(series_id.to_string(), tags.clone());
    }

    /// Series under `name` whose tags are a superset of `filter`. An empty
    /// filter matches every series with that name.
    pub fn series_for(&self, name: &str, filter: &Labels) -> Vec<String> {
        let by_name = self.by_name.read().unwrap_or_else(|e| e.into_inner());
        let Some(candidates) = by_name.get(name) else {
            return Vec::new();
        };
        if filter.is_empty() {
            return candidates.iter().cloned().collect();
        }
        let tags_by_series = self.tags_by_series.read().unwrap_or_else(|e| e.into_inner());
        candidates
            .iter()
            .filter(|series_id| {
                tags_by_series
                    .get(*series_id)
                    .map(|tags| filter.iter().all(|(k, v)| tags.get(k) == Some(v)))
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    pub fn tag_keys_for(&self, name: &str) -> HashSet<String> {
        let by_name = self.by_name.read().unwrap_or_else(|e| e.into_inner());
        let tags_by_series = self.tags_by_series.read().unwrap_or_else(|e| e.into_inner());
        by_name
            .get(name)
            .into_iter()
            .flatten()
            .filter_map(|series_id| tags_by_series.get(series_id))
            .flat_map(|tags| tags.keys().cloned())
            .collect()
    }
}
