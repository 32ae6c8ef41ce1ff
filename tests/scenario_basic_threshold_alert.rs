//! End-to-end threshold alert lifecycle driven entirely through the public
//! `AlertManager` API, counting the notifications a real `Notifier`
//! implementation observes rather than inspecting internal state.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use monitor_core::alert::{Annotations, Labels, AlertState, Severity};
use monitor_core::manager::{AlertManager, AlertManagerConfig};
use monitor_core::notifiers::CallbackNotifier;
use monitor_core::rules::Rule;
use monitor_core::triggers::{ThresholdOperator, ThresholdTrigger, Trigger};

fn high_cpu_rule() -> Rule {
    Rule::new(
        "high_cpu",
        "cpu_usage",
        Severity::Warning,
        Labels::new(),
        Annotations::new(),
        Trigger::Threshold(ThresholdTrigger::new(ThresholdOperator::GreaterThan, 80.0)),
        Duration::from_secs(1),
        Duration::from_secs(2),
        Duration::from_secs(5),
    )
}

#[test]
fn basic_threshold_alert_notifies_on_fire_and_resolve() {
    let mgr = Arc::new(
        AlertManager::new(AlertManagerConfig {
            enable_grouping: false,
            default_cooldown: Duration::from_millis(1),
            dedup_cache_duration: Duration::from_millis(1),
            ..Default::default()
        })
        .unwrap(),
    );
    mgr.add_rule(high_cpu_rule()).unwrap();

    let fired = Arc::new(AtomicUsize::new(0));
    let resolved = Arc::new(AtomicUsize::new(0));
    let fired_clone = fired.clone();
    let resolved_clone = resolved.clone();
    mgr.add_notifier(Box::new(CallbackNotifier::new(
        "counter",
        Box::new(move |alert| {
            match alert.state {
                AlertState::Firing => {
                    fired_clone.fetch_add(1, Ordering::SeqCst);
                }
                AlertState::Resolved => {
                    resolved_clone.fetch_add(1, Ordering::SeqCst);
                }
                _ => {}
            }
            Ok(())
        }),
    )));

    let t0 = Utc::now();
    let samples = [
        (0, 50.0, AlertState::Inactive),
        (1, 85.0, AlertState::Pending),
        (2, 90.0, AlertState::Pending),
        (4, 90.0, AlertState::Firing),
        (5, 40.0, AlertState::Resolved),
    ];
    for (offset, value, expect) in samples {
        let now = t0 + chrono::Duration::seconds(offset);
        mgr.process_metric("cpu_usage", value, now);
        let fp = monitor_core::alert::fingerprint("high_cpu", &Labels::new());
        if expect == AlertState::Inactive {
            assert!(mgr.alert_state(&fp).is_none());
        } else {
            assert_eq!(mgr.alert_state(&fp), Some(expect));
        }
    }

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(resolved.load(Ordering::SeqCst), 1);
}

#[test]
fn silenced_alert_reaches_firing_state_but_emits_no_notification() {
    let mgr = Arc::new(
        AlertManager::new(AlertManagerConfig {
            enable_grouping: false,
            default_cooldown: Duration::from_millis(1),
            ..Default::default()
        })
        .unwrap(),
    );
    mgr.add_rule(high_cpu_rule()).unwrap();

    let notified = Arc::new(AtomicUsize::new(0));
    let notified_clone = notified.clone();
    mgr.add_notifier(Box::new(CallbackNotifier::new(
        "counter",
        Box::new(move |_alert| {
            notified_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }),
    )));

    // An empty matcher set matches every label set vacuously, which is
    // sufficient here since the rule under test carries no labels.
    let matchers: BTreeMap<String, String> = BTreeMap::new();
    let t0 = Utc::now();
    mgr.add_silence(monitor_core::alert::Silence {
        id: uuid::Uuid::new_v4(),
        matchers,
        starts_at: t0,
        ends_at: t0 + chrono::Duration::hours(1),
        comment: "maintenance".to_string(),
        creator: "test".to_string(),
    })
    .unwrap();

    mgr.process_metric("cpu_usage", 85.0, t0 + chrono::Duration::seconds(1));
    mgr.process_metric("cpu_usage", 90.0, t0 + chrono::Duration::seconds(4));

    let fp = monitor_core::alert::fingerprint("high_cpu", &Labels::new());
    assert_eq!(mgr.alert_state(&fp), Some(AlertState::Suppressed));
    assert_eq!(notified.load(Ordering::SeqCst), 0);
}
