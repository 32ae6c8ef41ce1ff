//! Alert grouping: batches related firing alerts so notifiers see one
//! group instead of a storm of individual alerts.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::alert::{Alert, AlertGroup, AlertState};

#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub group_wait: Duration,
    pub group_interval: Duration,
    pub resolve_timeout: Duration,
    pub group_by_labels: Vec<String>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            group_wait: Duration::from_secs(30),
            group_interval: Duration::from_secs(300),
            resolve_timeout: Duration::from_secs(300),
            group_by_labels: Vec::new(),
        }
    }
}

/// Joins `label=value:` pairs over `group_by_labels`, in declared order; an
/// empty label list falls back to the rule name. This is the literal
/// `label1=val1:label2=val2:` format the grouping contract specifies.
pub fn compute_group_key(rule_name: &str, alert: &Alert, group_by_labels: &[String]) -> String {
    if group_by_labels.is_empty() {
        return rule_name.to_string();
    }
    let mut key = String::new();
    for label in group_by_labels {
        if let Some(value) = alert.labels.get(label) {
            key.push_str(label);
            key.push('=');
            key.push_str(value);
            key.push(':');
        }
    }
    key
}

pub struct Aggregator {
    config: AggregatorConfig,
    groups: Mutex<HashMap<String, AlertGroup>>,
}

impl Aggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self {
            config,
            groups: Mutex::new(HashMap::new()),
        }
    }

    /// Inserts or replaces `alert` into its group, keyed by
    /// [`compute_group_key`]. An alert with an equal fingerprint to one
    /// already present in the group replaces it rather than appending.
    pub fn add_alert(&self, alert: Alert, now: DateTime<Utc>) {
        let key = compute_group_key(&alert.rule_name, &alert, &self.config.group_by_labels);
        let mut groups = self.groups.lock().unwrap_or_else(|e| e.into_inner());
        let group = groups.entry(key.clone()).or_insert_with(|| {
            let common_labels = self
                .config
                .group_by_labels
                .iter()
                .filter_map(|l| alert.labels.get(l).map(|v| (l.clone(), v.clone())))
                .collect();
            AlertGroup {
                group_key: key.clone(),
                common_labels,
                alerts: Vec::new(),
                first_seen: now,
                updated_at: now,
                last_sent: None,
            }
        });

        let fp = alert.fingerprint();
        if let Some(existing) = group.alerts.iter_mut().find(|a| a.fingerprint() == fp) {
            *existing = alert;
        } else {
            group.alerts.push(alert);
        }
        group.updated_at = now;
    }

    /// Groups that have waited `group_wait` since first seen and, if
    /// previously sent, waited `group_interval` since the last send.
    pub fn get_ready_groups(&self, now: DateTime<Utc>) -> Vec<AlertGroup> {
        let groups = self.groups.lock().unwrap_or_else(|e| e.into_inner());
        groups
            .values()
            .filter(|g| {
                let waited_initial =
                    now.signed_duration_since(g.first_seen) >= chrono_duration(self.config.group_wait);
                let ready_to_resend = match g.last_sent {
                    None => true,
                    Some(sent) => {
                        now.signed_duration_since(sent) >= chrono_duration(self.config.group_interval)
                    }
                };
                waited_initial && ready_to_resend
            })
            .cloned()
            .collect()
    }

    pub fn mark_sent(&self, key: &str, now: DateTime<Utc>) {
        if let Some(group) = self.groups.lock().unwrap_or_else(|e| e.into_inner()).get_mut(key) {
            group.last_sent = Some(now);
        }
    }

    /// Drops resolved alerts older than `resolve_timeout` and removes
    /// groups that become empty as a result.
    pub fn cleanup(&self, now: DateTime<Utc>) {
        let mut groups = self.groups.lock().unwrap_or_else(|e| e.into_inner());
        groups.retain(|_, group| {
            group.alerts.retain(|a| {
                a.state != AlertState::Resolved
                    || a.resolved_at
                        .map(|r| now.signed_duration_since(r) < chrono_duration(self.config.resolve_timeout))
                        .unwrap_or(true)
            });
            !group.alerts.is_empty()
        });
    }

    pub fn group_count(&self) -> usize {
        self.groups.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

fn chrono_duration(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::zero())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{Annotations, Labels, Severity};
    use std::collections::BTreeMap;

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect::<BTreeMap<_, _>>()
    }

    fn firing_alert(now: DateTime<Utc>) -> Alert {
        let mut a = Alert::new(
            "high_cpu",
            "high_cpu",
            labels(&[("team", "infra"), ("service", "compute")]),
            Annotations::new(),
            Severity::Warning,
            95.0,
            now,
        );
        a.transition_to(AlertState::Pending, now);
        a.transition_to(AlertState::Firing, now);
        a
    }

    #[test]
    fn replacing_same_fingerprint_keeps_one_alert() {
        let agg = Aggregator::new(AggregatorConfig::default());
        let now = Utc::now();
        let a = firing_alert(now);
        agg.add_alert(a.clone(), now);
        let mut a2 = a.clone();
        a2.value = 99.0;
        agg.add_alert(a2.clone(), now);
        let groups = agg.get_ready_groups(now + chrono::Duration::seconds(60));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].alerts.len(), 1);
        assert_eq!(groups[0].alerts[0].value, 99.0);
    }

    #[test]
    fn group_not_ready_before_group_wait() {
        let mut cfg = AggregatorConfig::default();
        cfg.group_wait = Duration::from_secs(1);
        cfg.group_by_labels = vec!["team".to_string(), "service".to_string()];
        let agg = Aggregator::new(cfg);
        let now = Utc::now();
        agg.add_alert(firing_alert(now), now);
        assert!(agg.get_ready_groups(now).is_empty());
        assert_eq!(agg.get_ready_groups(now + chrono::Duration::seconds(2)).len(), 1);
    }

    #[test]
    fn group_key_joins_labels_in_order() {
        let now = Utc::now();
        let alert = firing_alert(now);
        let key = compute_group_key("high_cpu", &alert, &["team".to_string(), "service".to_string()]);
        assert_eq!(key, "team=infra:service=compute:");
    }
}
