//! End-to-end wiring: writes land in a `MetricDatabase`, a `MetricProvider`
//! closure reads the latest value back out of it, and an `AlertManager`
//! evaluation tick turns that value into an alert transition. Exercises the
//! seam between the storage and alerting halves of the crate, which no
//! single module's unit tests cross.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use monitor_core::alert::{fingerprint, AlertState, Annotations, Labels, Severity};
use monitor_core::cfg::DatabaseConfig;
use monitor_core::database::MetricDatabase;
use monitor_core::manager::{AlertManager, AlertManagerConfig};
use monitor_core::provider::ClosureMetricProvider;
use monitor_core::rules::Rule;
use monitor_core::triggers::{ThresholdOperator, ThresholdTrigger, Trigger};

#[test]
fn writes_through_the_database_drive_alert_state_via_a_metric_provider() {
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(
        MetricDatabase::new(DatabaseConfig::default(), dir.path().to_path_buf(), Vec::new()).unwrap(),
    );

    let now = Utc::now();
    db.write("queue_depth", 120.0, now, Labels::new()).unwrap();

    let db_for_provider = db.clone();
    let provider = ClosureMetricProvider(move |name: &str| {
        let start = now - chrono::Duration::seconds(10);
        let end = now + chrono::Duration::seconds(10);
        db_for_provider
            .query(name, start, end, &Labels::new())
            .ok()
            .and_then(|points| points.last().map(|(_, v, _)| *v))
    });

    let mgr = AlertManager::new(AlertManagerConfig {
        enable_grouping: false,
        ..Default::default()
    })
    .unwrap();
    mgr.add_rule(Rule::new(
        "queue_backed_up",
        "queue_depth",
        Severity::Critical,
        Labels::new(),
        Annotations::new(),
        Trigger::Threshold(ThresholdTrigger::new(ThresholdOperator::GreaterThan, 100.0)),
        Duration::from_secs(1),
        Duration::from_nanos(1),
        Duration::from_secs(5),
    ))
    .unwrap();

    let value = provider.value_for("queue_depth").expect("the write should be queryable back out");
    assert_eq!(value, 120.0);
    // First tick moves Inactive -> Pending; with a minimal for_duration the
    // second tick, one microsecond later, is eligible to promote to Firing.
    mgr.process_metric("queue_depth", value, now);
    mgr.process_metric("queue_depth", value, now + chrono::Duration::microseconds(1));

    let fp = fingerprint("queue_backed_up", &Labels::new());
    assert_eq!(mgr.alert_state(&fp), Some(AlertState::Firing));
}
