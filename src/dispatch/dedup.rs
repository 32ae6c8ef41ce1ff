//! Deduplication: suppresses repeat notifications for an unchanged alert.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::alert::AlertState;

struct Entry {
    last_seen: DateTime<Utc>,
    last_state: AlertState,
}

/// LRU-like cache keyed by fingerprint. An alert is a duplicate iff it was
/// seen within `cache_duration` AND its state matches the last recorded
/// state; a state change resets the duplicate verdict without expiring the
/// cache entry itself.
pub struct Deduplicator {
    cache_duration: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl Deduplicator {
    pub fn new(cache_duration: Duration) -> Self {
        Self {
            cache_duration,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_duplicate(&self, fingerprint: &str, state: AlertState, now: DateTime<Utc>) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let duplicate = match entries.get(fingerprint) {
            Some(entry) => {
                let within_window = now.signed_duration_since(entry.last_seen)
                    < chrono::Duration::from_std(self.cache_duration).unwrap_or(chrono::Duration::zero());
                within_window && entry.last_state == state
            }
            None => false,
        };
        entries.insert(
            fingerprint.to_string(),
            Entry {
                last_seen: now,
                last_state: state,
            },
        );
        duplicate
    }

    pub fn evict_expired(&self, now: DateTime<Utc>) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let window = chrono::Duration::from_std(self.cache_duration).unwrap_or(chrono::Duration::zero());
        entries.retain(|_, e| now.signed_duration_since(e.last_seen) < window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_call_within_window_is_duplicate() {
        let d = Deduplicator::new(Duration::from_secs(60));
        let now = Utc::now();
        assert!(!d.is_duplicate("fp", AlertState::Firing, now));
        assert!(d.is_duplicate("fp", AlertState::Firing, now + chrono::Duration::seconds(1)));
    }

    #[test]
    fn state_change_resets_duplicate_verdict() {
        let d = Deduplicator::new(Duration::from_secs(60));
        let now = Utc::now();
        d.is_duplicate("fp", AlertState::Firing, now);
        assert!(!d.is_duplicate("fp", AlertState::Resolved, now + chrono::Duration::seconds(1)));
    }

    #[test]
    fn expired_entry_is_not_duplicate() {
        let d = Deduplicator::new(Duration::from_secs(5));
        let now = Utc::now();
        d.is_duplicate("fp", AlertState::Firing, now);
        assert!(!d.is_duplicate("fp", AlertState::Firing, now + chrono::Duration::seconds(10)));
    }
}
