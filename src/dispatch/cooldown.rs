//! Cooldown tracker: rate-limits notifications per alert fingerprint.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

struct State {
    last_notification: DateTime<Utc>,
    override_cooldown: Option<Duration>,
}

pub struct CooldownTracker {
    default_cooldown: Duration,
    state: Mutex<HashMap<String, State>>,
}

impl CooldownTracker {
    pub fn new(default_cooldown: Duration) -> Self {
        Self {
            default_cooldown,
            state: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_override(&self, fingerprint: &str, cooldown: Duration) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .entry(fingerprint.to_string())
            .or_insert_with(|| State {
                last_notification: DateTime::<Utc>::UNIX_EPOCH,
                override_cooldown: None,
            })
            .override_cooldown = Some(cooldown);
    }

    pub fn is_in_cooldown(&self, fingerprint: &str, now: DateTime<Utc>) -> bool {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match state.get(fingerprint) {
            Some(s) => {
                let cooldown = s.override_cooldown.unwrap_or(self.default_cooldown);
                now.signed_duration_since(s.last_notification)
                    < chrono::Duration::from_std(cooldown).unwrap_or(chrono::Duration::zero())
            }
            None => false,
        }
    }

    pub fn record_notification(&self, fingerprint: &str, now: DateTime<Utc>) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let entry = state.entry(fingerprint.to_string()).or_insert_with(|| State {
            last_notification: now,
            override_cooldown: None,
        });
        entry.last_notification = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_holds_for_the_configured_window() {
        let c = CooldownTracker::new(Duration::from_secs(10));
        let now = Utc::now();
        c.record_notification("fp", now);
        assert!(c.is_in_cooldown("fp", now + chrono::Duration::seconds(5)));
        assert!(!c.is_in_cooldown("fp", now + chrono::Duration::seconds(11)));
    }

    #[test]
    fn per_fingerprint_override_takes_precedence() {
        let c = CooldownTracker::new(Duration::from_secs(60));
        c.set_override("fp", Duration::from_secs(1));
        let now = Utc::now();
        c.record_notification("fp", now);
        assert!(!c.is_in_cooldown("fp", now + chrono::Duration::seconds(2)));
    }
}
