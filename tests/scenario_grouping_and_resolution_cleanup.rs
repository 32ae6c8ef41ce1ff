//! Aggregator grouping lifecycle: three alerts sharing labels group
//! together, become ready after `group_wait`, go quiet until the next
//! `group_interval`, and a resolved member is swept out by `cleanup` once
//! `resolve_timeout` has passed.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;

use monitor_core::alert::{Alert, AlertState, Annotations, Labels, Severity};
use monitor_core::dispatch::{Aggregator, AggregatorConfig};

fn labels(pairs: &[(&str, &str)]) -> Labels {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect::<BTreeMap<_, _>>()
}

fn firing_alert(name: &str, now: chrono::DateTime<Utc>) -> Alert {
    let mut a = Alert::new(
        name,
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
fn three_alerts_group_then_quiet_then_cleanup_drops_resolved() {
    let config = AggregatorConfig {
        group_wait: Duration::from_secs(1),
        group_interval: Duration::from_secs(3),
        resolve_timeout: Duration::from_secs(5),
        group_by_labels: vec!["team".to_string(), "service".to_string()],
    };
    let aggregator = Aggregator::new(config);

    let t0 = Utc::now();
    let mut alerts = vec![
        firing_alert("alert_a", t0),
        firing_alert("alert_b", t0),
        firing_alert("alert_c", t0),
    ];
    for alert in &alerts {
        aggregator.add_alert(alert.clone(), t0);
    }

    assert!(aggregator.get_ready_groups(t0).is_empty());

    let t1 = t0 + chrono::Duration::seconds(1);
    let ready = aggregator.get_ready_groups(t1);
    assert_eq!(ready.len(), 1);
    assert_eq!(ready[0].alerts.len(), 3);
    aggregator.mark_sent(&ready[0].group_key, t1);

    // No repeat until group_interval elapses from the send.
    assert!(aggregator.get_ready_groups(t1 + chrono::Duration::seconds(1)).is_empty());
    assert_eq!(aggregator.get_ready_groups(t1 + chrono::Duration::seconds(3)).len(), 1);

    let t_resolve = t0 + chrono::Duration::seconds(2);
    alerts[0].transition_to(AlertState::Resolved, t_resolve);
    aggregator.add_alert(alerts[0].clone(), t_resolve);

    let before_timeout = t_resolve + chrono::Duration::seconds(4);
    aggregator.cleanup(before_timeout);
    assert_eq!(aggregator.group_count(), 1, "group survives before resolve_timeout elapses");

    let after_timeout = t_resolve + chrono::Duration::seconds(6);
    aggregator.cleanup(after_timeout);
    let remaining = aggregator.get_ready_groups(after_timeout);
    assert_eq!(remaining[0].alerts.len(), 2, "the resolved alert is swept out after resolve_timeout");
}
