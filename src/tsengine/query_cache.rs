//! Memoizes recent query results keyed by a stable hash of
//! `(name, start, end, tag_filter)`, evicted by TTL or a size cap.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::alert::Labels;

#[derive(Clone)]
struct Entry {
    value: Vec<(DateTime<Utc>, f64, Labels)>,
    inserted_at: Instant,
}

pub struct QueryCache {
    max_entries: usize,
    ttl: Duration,
    entries: Mutex<HashMap<u64, Entry>>,
}

fn cache_key(name: &str, start: DateTime<Utc>, end: DateTime<Utc>, tag_filter: &Labels) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    name.hash(&mut hasher);
    start.timestamp_micros().hash(&mut hasher);
    end.timestamp_micros().hash(&mut hasher);
    for (k, v) in tag_filter {
        k.hash(&mut hasher);
        v.hash(&mut hasher);
    }
    hasher.finish()
}

impl QueryCache {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            max_entries,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(
        &self,
        name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        tag_filter: &Labels,
    ) -> Option<Vec<(DateTime<Utc>, f64, Labels)>> {
        let key = cache_key(name, start, end, tag_filter);
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(&key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    pub fn put(
        &self,
        name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        tag_filter: &Labels,
        value: Vec<(DateTime<Utc>, f64, Labels)>,
    ) {
        let key = cache_key(name, start, end, tag_filter);
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            // Evict an arbitrary entry rather than tracking exact LRU order;
            // the cache is a throughput optimization, not a correctness
            // dependency, so approximate eviction is acceptable.
            if let Some(evict_key) = entries.keys().next().copied() {
                entries.remove(&evict_key);
            }
        }
        entries.insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn invalidate_all(&self) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_then_hit_after_put() {
        let cache = QueryCache::new(10, Duration::from_secs(60));
        let now = Utc::now();
        assert!(cache.get("cpu", now, now, &Labels::new()).is_none());
        cache.put("cpu", now, now, &Labels::new(), vec![(now, 1.0, Labels::new())]);
        assert!(cache.get("cpu", now, now, &Labels::new()).is_some());
    }

    #[test]
    fn entry_expires_after_ttl() {
        let cache = QueryCache::new(10, Duration::from_millis(1));
        let now = Utc::now();
        cache.put("cpu", now, now, &Labels::new(), vec![]);
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("cpu", now, now, &Labels::new()).is_none());
    }

    #[test]
    fn size_cap_evicts_something() {
        let cache = QueryCache::new(1, Duration::from_secs(60));
        let now = Utc::now();
        cache.put("cpu", now, now, &Labels::new(), vec![]);
        cache.put("mem", now, now, &Labels::new(), vec![]);
        assert_eq!(cache.len(), 1);
    }
}
