//! The alert manager: owns rules, active alerts, silences, and notifiers,
//! and runs the evaluation worker that drives the state machine.

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::alert::{fingerprint, Alert, AlertState, Annotations, InhibitionRule, Labels, Severity, Silence};
use crate::clock::{Clock, SystemClock};
use crate::dispatch::{Aggregator, AggregatorConfig, CooldownTracker, Deduplicator, Inhibitor};
use crate::error::{MonitorError, MonitorResult};
use crate::manager::config::{AlertManagerConfig, AlertManagerMetrics};
use crate::notifiers::Notifier;
use crate::provider::MetricProvider;
use crate::rules::Rule;

struct PendingState {
    since: DateTime<Utc>,
}

struct ResolvingState {
    since: DateTime<Utc>,
}

pub struct AlertManager {
    config: AlertManagerConfig,
    rules: Mutex<HashMap<String, Rule>>,
    active_alerts: Mutex<HashMap<String, Alert>>,
    pending_since: Mutex<HashMap<String, PendingState>>,
    resolving_since: Mutex<HashMap<String, ResolvingState>>,
    silences: Mutex<HashMap<Uuid, Silence>>,
    notifiers: Mutex<Vec<Box<dyn Notifier>>>,
    inhibitor: Mutex<Inhibitor>,
    aggregator: Aggregator,
    dedup: Deduplicator,
    cooldown: CooldownTracker,
    last_notification_times: Mutex<HashMap<String, DateTime<Utc>>>,
    metrics: AlertManagerMetrics,
    metric_provider: Mutex<Option<Arc<dyn MetricProvider>>>,
    running: Arc<std::sync::atomic::AtomicBool>,
    wake: Arc<Condvar>,
    wake_lock: Arc<Mutex<()>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    clock: Arc<dyn Clock>,
}

impl AlertManager {
    pub fn new(config: AlertManagerConfig) -> MonitorResult<Self> {
        Self::new_with_clock(config, Arc::new(SystemClock))
    }

    /// Same as [`Self::new`] but with an explicit monotonic clock, so tests
    /// can drive `RateOfChange`/`Absent` triggers with a
    /// [`crate::clock::FakeClock`] instead of the real wall clock.
    pub fn new_with_clock(config: AlertManagerConfig, clock: Arc<dyn Clock>) -> MonitorResult<Self> {
        config.validate()?;
        Ok(Self {
            aggregator: Aggregator::new(AggregatorConfig {
                group_wait: config.group_wait,
                group_interval: config.group_interval,
                resolve_timeout: config.resolve_timeout,
                group_by_labels: config.group_by_labels.clone(),
            }),
            dedup: Deduplicator::new(config.dedup_cache_duration),
            cooldown: CooldownTracker::new(config.default_cooldown),
            config,
            rules: Mutex::new(HashMap::new()),
            active_alerts: Mutex::new(HashMap::new()),
            pending_since: Mutex::new(HashMap::new()),
            resolving_since: Mutex::new(HashMap::new()),
            silences: Mutex::new(HashMap::new()),
            notifiers: Mutex::new(Vec::new()),
            inhibitor: Mutex::new(Inhibitor::new(Vec::new())),
            last_notification_times: Mutex::new(HashMap::new()),
            metrics: AlertManagerMetrics::default(),
            metric_provider: Mutex::new(None),
            running: Arc::new(std::sync::atomic::AtomicBool::new(false)),
            wake: Arc::new(Condvar::new()),
            wake_lock: Arc::new(Mutex::new(())),
            worker: Mutex::new(None),
            clock,
        })
    }

    pub fn metrics(&self) -> &AlertManagerMetrics {
        &self.metrics
    }

    pub fn add_rule(&self, rule: Rule) -> MonitorResult<()> {
        rule.validate()?;
        let mut rules = self.rules.lock().unwrap_or_else(|e| e.into_inner());
        if rules.contains_key(&rule.name) {
            return Err(MonitorError::already_exists(format!(
                "rule '{}' already registered",
                rule.name
            )));
        }
        rules.insert(rule.name.clone(), rule);
        Ok(())
    }

    pub fn remove_rule(&self, name: &str) -> MonitorResult<()> {
        let mut rules = self.rules.lock().unwrap_or_else(|e| e.into_inner());
        rules
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| MonitorError::not_found(format!("rule '{name}' not found")))
    }

    pub fn add_notifier(&self, notifier: Box<dyn Notifier>) {
        self.notifiers.lock().unwrap_or_else(|e| e.into_inner()).push(notifier);
    }

    pub fn set_inhibition_rules(&self, rules: Vec<InhibitionRule>) {
        *self.inhibitor.lock().unwrap_or_else(|e| e.into_inner()) = Inhibitor::new(rules);
    }

    pub fn set_metric_provider(&self, provider: Arc<dyn MetricProvider>) {
        *self.metric_provider.lock().unwrap_or_else(|e| e.into_inner()) = Some(provider);
    }

    pub fn add_silence(&self, silence: Silence) -> MonitorResult<Uuid> {
        let mut silences = self.silences.lock().unwrap_or_else(|e| e.into_inner());
        if silences.len() >= self.config.max_silences {
            return Err(MonitorError::ResourceExhausted(
                "max_silences reached".to_string(),
            ));
        }
        let id = silence.id;
        silences.insert(id, silence);
        Ok(id)
    }

    pub fn remove_silence(&self, id: Uuid) {
        self.silences.lock().unwrap_or_else(|e| e.into_inner()).remove(&id);
    }

    fn matching_silence(&self, labels: &Labels, now: DateTime<Utc>) -> bool {
        self.silences
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .any(|s| s.matches(labels, now))
    }

    /// Looks up every enabled rule watching `metric_name` and evaluates
    /// each against `value`.
    pub fn process_metric(&self, metric_name: &str, value: f64, now: DateTime<Utc>) {
        let matching: Vec<RuleSnapshot> = {
            let rules = self.rules.lock().unwrap_or_else(|e| e.into_inner());
            rules
                .values()
                .filter(|r| r.enabled && r.metric_name == metric_name)
                .map(RuleSnapshot::from)
                .collect()
        };
        for snapshot in matching {
            self.evaluate_snapshot(&snapshot, value, now);
        }
    }

    fn evaluate_snapshot(&self, snapshot: &RuleSnapshot, value: f64, now: DateTime<Utc>) {
        self.metrics.evaluations.fetch_add(1, Ordering::Relaxed);
        let met = {
            let rules = self.rules.lock().unwrap_or_else(|e| e.into_inner());
            match rules.get(&snapshot.name) {
                Some(rule) => rule.trigger.evaluate(value, self.clock.now()),
                None => return,
            }
        };
        let fp = fingerprint(&snapshot.name, &snapshot.labels);
        self.update_alert_state(&fp, met, value, snapshot, now);
    }

    #[allow(clippy::too_many_lines)]
    fn update_alert_state(&self, fp: &str, met: bool, value: f64, rule: &RuleSnapshot, now: DateTime<Utc>) {
        let rule_alert_count = {
            let active = self.active_alerts.lock().unwrap_or_else(|e| e.into_inner());
            active.values().filter(|a| a.rule_name == rule.name).count()
        };

        let mut active = self.active_alerts.lock().unwrap_or_else(|e| e.into_inner());
        let is_new = !active.contains_key(fp);
        if is_new && met && rule_alert_count >= self.config.max_alerts_per_rule {
            self.metrics.collection_errors.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let alert = active.entry(fp.to_string()).or_insert_with(|| {
            let mut a = Alert::new(
                rule.name.clone(),
                rule.name.clone(),
                rule.labels.clone(),
                rule.annotations.clone(),
                rule.severity,
                value,
                now,
            );
            a.group_key = rule.name.clone();
            a
        });
        alert.value = value;

        let mut should_notify_transition: Option<AlertState> = None;
        let mut pending_since = self.pending_since.lock().unwrap_or_else(|e| e.into_inner());
        let mut resolving_since = self.resolving_since.lock().unwrap_or_else(|e| e.into_inner());

        match (alert.state, met) {
            (AlertState::Inactive, true) => {
                alert.transition_to(AlertState::Pending, now);
                pending_since.insert(fp.to_string(), PendingState { since: now });
            }
            (AlertState::Pending, true) => {
                if let Some(p) = pending_since.get(fp) {
                    if now.signed_duration_since(p.since)
                        >= chrono::Duration::from_std(rule.for_duration).unwrap_or(chrono::Duration::zero())
                    {
                        alert.transition_to(AlertState::Firing, now);
                        should_notify_transition = Some(AlertState::Firing);
                    }
                }
            }
            (AlertState::Pending, false) => {
                alert.transition_to(AlertState::Inactive, now);
                pending_since.remove(fp);
            }
            (AlertState::Firing, false) => {
                // `keep_firing_for` hysteresis: stay Firing until the
                // trigger has been continuously false for that long, rather
                // than resolving on the first non-matching evaluation.
                if rule.keep_firing_for.is_zero() {
                    alert.transition_to(AlertState::Resolved, now);
                    should_notify_transition = Some(AlertState::Resolved);
                } else {
                    let since = resolving_since
                        .entry(fp.to_string())
                        .or_insert_with(|| ResolvingState { since: now })
                        .since;
                    if now.signed_duration_since(since)
                        >= chrono::Duration::from_std(rule.keep_firing_for).unwrap_or(chrono::Duration::zero())
                    {
                        alert.transition_to(AlertState::Resolved, now);
                        should_notify_transition = Some(AlertState::Resolved);
                        resolving_since.remove(fp);
                    }
                }
            }
            (AlertState::Resolved, true) => {
                alert.transition_to(AlertState::Pending, now);
                pending_since.insert(fp.to_string(), PendingState { since: now });
            }
            (AlertState::Firing, true) => {
                resolving_since.remove(fp);
                let last = self
                    .last_notification_times
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .get(fp)
                    .copied();
                let repeat_due = last
                    .map(|t| {
                        now.signed_duration_since(t)
                            >= chrono::Duration::from_std(rule.repeat_interval)
                                .unwrap_or(chrono::Duration::zero())
                    })
                    .unwrap_or(true);
                if repeat_due {
                    should_notify_transition = Some(AlertState::Firing);
                }
            }
            _ => {}
        }

        let silenced = self.matching_silence(&alert.labels, now);
        if silenced && alert.state != AlertState::Suppressed {
            alert.transition_to(AlertState::Suppressed, now);
        } else if !silenced && alert.state == AlertState::Suppressed {
            // `transition_to`'s target argument is ignored whenever the
            // current state is already `Suppressed` — it always restores
            // `prior_state` instead. Any non-`Suppressed` placeholder works.
            alert.transition_to(AlertState::Inactive, now);
        }

        let snapshot_alert = alert.clone();
        drop(pending_since);
        drop(resolving_since);
        drop(active);

        if let Some(_transition) = should_notify_transition {
            if silenced {
                self.metrics.alerts_suppressed.fetch_add(1, Ordering::Relaxed);
            } else {
                self.dispatch_notification(&snapshot_alert, now);
            }
        }
    }

    // Filter order follows the silence -> inhibition -> cooldown pipeline;
    // silence is already applied by the caller before this is reached.
    fn dispatch_notification(&self, alert: &Alert, now: DateTime<Utc>) {
        let fp = alert.fingerprint();

        let all_firing: Vec<Alert> = self
            .active_alerts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|a| a.state == AlertState::Firing)
            .cloned()
            .collect();
        if self
            .inhibitor
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_inhibited(alert, &all_firing)
        {
            return;
        }

        if self.cooldown.is_in_cooldown(&fp, now) {
            return;
        }
        if self.dedup.is_duplicate(&fp, alert.state, now) {
            return;
        }

        self.cooldown.record_notification(&fp, now);
        self.last_notification_times
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(fp, now);

        if self.config.enable_grouping {
            self.aggregator.add_alert(alert.clone(), now);
            return;
        }

        let notifiers = self.notifiers.lock().unwrap_or_else(|e| e.into_inner());
        for notifier in notifiers.iter() {
            if !notifier.is_ready() {
                continue;
            }
            match notifier.notify(alert) {
                Ok(()) => {
                    self.metrics.notifications_sent.fetch_add(1, Ordering::Relaxed);
                }
                Err(_) => {
                    self.metrics.notifications_failed.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    /// Flushes any aggregator groups that have become ready to the
    /// registered notifiers. Called by the evaluation worker every tick
    /// and available for callers driving evaluation manually in tests.
    pub fn flush_ready_groups(&self, now: DateTime<Utc>) {
        for group in self.aggregator.get_ready_groups(now) {
            let notifiers = self.notifiers.lock().unwrap_or_else(|e| e.into_inner());
            for notifier in notifiers.iter() {
                if !notifier.is_ready() {
                    continue;
                }
                match notifier.notify_group(&group) {
                    Ok(()) => self.metrics.notifications_sent.fetch_add(1, Ordering::Relaxed),
                    Err(_) => self.metrics.notifications_failed.fetch_add(1, Ordering::Relaxed),
                };
            }
            self.aggregator.mark_sent(&group.group_key, now);
        }
        self.aggregator.cleanup(now);
    }

    pub fn active_alert_count(&self) -> usize {
        self.active_alerts.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn alert_state(&self, fingerprint: &str) -> Option<AlertState> {
        self.active_alerts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(fingerprint)
            .map(|a| a.state)
    }

    /// Starts the evaluation worker: every `default_evaluation_interval`,
    /// pulls one value per enabled rule's metric name from the registered
    /// provider and feeds it through `process_metric`, then flushes any
    /// aggregator groups that became ready. Sleeps on a condition variable
    /// so `stop` joins deterministically within one interval.
    pub fn start(self: &Arc<Self>) -> MonitorResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(MonitorError::AlreadyStarted);
        }
        let this = self.clone();
        let interval = self.config.default_evaluation_interval;
        let running = self.running.clone();
        let wake = self.wake.clone();
        let wake_lock = self.wake_lock.clone();

        let handle = std::thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                this.tick(crate::clock::wallclock_now());

                let guard = wake_lock.lock().unwrap_or_else(|e| e.into_inner());
                let _ = wake.wait_timeout(guard, interval);
            }
        });
        *self.worker.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        Ok(())
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.wake.notify_all();
        if let Some(handle) = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take() {
            let _ = handle.join();
        }
    }

    pub fn tick(&self, now: DateTime<Utc>) {
        let provider = self.metric_provider.lock().unwrap_or_else(|e| e.into_inner()).clone();
        let Some(provider) = provider else { return };
        let names: Vec<String> = {
            let rules = self.rules.lock().unwrap_or_else(|e| e.into_inner());
            rules
                .values()
                .filter(|r| r.enabled)
                .map(|r| r.metric_name.clone())
                .collect()
        };
        for name in names {
            if let Some(value) = provider.value_for(&name) {
                self.process_metric(&name, value, now);
            }
        }
        self.flush_ready_groups(now);
    }
}

/// A snapshot of the fields `evaluate_rule` needs, taken under the rules
/// lock so evaluation doesn't hold it for the duration of trigger
/// evaluation and notification dispatch.
struct RuleSnapshot {
    name: String,
    labels: Labels,
    annotations: Annotations,
    severity: Severity,
    for_duration: std::time::Duration,
    repeat_interval: std::time::Duration,
    keep_firing_for: std::time::Duration,
}

impl From<&Rule> for RuleSnapshot {
    fn from(rule: &Rule) -> Self {
        Self {
            name: rule.name.clone(),
            labels: rule.labels.clone(),
            annotations: rule.annotations.clone(),
            severity: rule.severity,
            for_duration: rule.for_duration,
            repeat_interval: rule.repeat_interval,
            keep_firing_for: rule.keep_firing_for,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triggers::{ThresholdOperator, ThresholdTrigger, Trigger};
    use std::time::Duration;

    fn manager() -> AlertManager {
        AlertManager::new(AlertManagerConfig {
            enable_grouping: false,
            ..Default::default()
        })
        .unwrap()
    }

    fn rule(for_duration: Duration, repeat_interval: Duration) -> Rule {
        Rule::new(
            "high_cpu",
            "cpu_usage",
            Severity::Warning,
            Labels::new(),
            Annotations::new(),
            Trigger::Threshold(ThresholdTrigger::new(ThresholdOperator::GreaterThan, 80.0)),
            Duration::from_secs(1),
            for_duration,
            repeat_interval,
        )
    }

    #[test]
    fn basic_threshold_lifecycle() {
        let mgr = manager();
        mgr.add_rule(rule(Duration::from_secs(2), Duration::from_secs(5))).unwrap();
        let fp = fingerprint("high_cpu", &Labels::new());
        let t0 = Utc::now();

        mgr.process_metric("cpu_usage", 50.0, t0);
        assert_eq!(mgr.alert_state(&fp), None);

        mgr.process_metric("cpu_usage", 85.0, t0 + chrono::Duration::seconds(1));
        assert_eq!(mgr.alert_state(&fp), Some(AlertState::Pending));

        mgr.process_metric("cpu_usage", 90.0, t0 + chrono::Duration::seconds(2));
        assert_eq!(mgr.alert_state(&fp), Some(AlertState::Pending));

        mgr.process_metric("cpu_usage", 90.0, t0 + chrono::Duration::seconds(4));
        assert_eq!(mgr.alert_state(&fp), Some(AlertState::Firing));

        mgr.process_metric("cpu_usage", 40.0, t0 + chrono::Duration::seconds(5));
        assert_eq!(mgr.alert_state(&fp), Some(AlertState::Resolved));
    }

    #[test]
    fn duplicate_rule_name_is_rejected() {
        let mgr = manager();
        mgr.add_rule(rule(Duration::from_secs(1), Duration::from_secs(1))).unwrap();
        assert!(mgr.add_rule(rule(Duration::from_secs(1), Duration::from_secs(1))).is_err());
    }

    #[test]
    fn start_twice_is_rejected() {
        let mgr = Arc::new(
            AlertManager::new(AlertManagerConfig {
                default_evaluation_interval: Duration::from_millis(10),
                ..Default::default()
            })
            .unwrap(),
        );
        mgr.set_metric_provider(Arc::new(crate::provider::ClosureMetricProvider(|_: &str| None)));
        mgr.start().unwrap();
        assert!(mgr.start().is_err());
        mgr.stop();
    }

    #[test]
    fn keep_firing_for_delays_resolution_past_the_hysteresis_window() {
        let mgr = manager();
        mgr.add_rule(
            rule(Duration::from_secs(1), Duration::from_secs(5))
                .with_keep_firing_for(Duration::from_secs(10)),
        )
        .unwrap();
        let fp = fingerprint("high_cpu", &Labels::new());
        let t0 = Utc::now();

        mgr.process_metric("cpu_usage", 90.0, t0);
        mgr.process_metric("cpu_usage", 90.0, t0 + chrono::Duration::seconds(2));
        assert_eq!(mgr.alert_state(&fp), Some(AlertState::Firing));

        // Trigger stops matching, but the rule's hysteresis keeps it Firing.
        mgr.process_metric("cpu_usage", 10.0, t0 + chrono::Duration::seconds(5));
        assert_eq!(mgr.alert_state(&fp), Some(AlertState::Firing));
        mgr.process_metric("cpu_usage", 10.0, t0 + chrono::Duration::seconds(12));
        assert_eq!(mgr.alert_state(&fp), Some(AlertState::Firing));

        // Once keep_firing_for has elapsed since it first stopped matching,
        // it resolves.
        mgr.process_metric("cpu_usage", 10.0, t0 + chrono::Duration::seconds(16));
        assert_eq!(mgr.alert_state(&fp), Some(AlertState::Resolved));
    }

    #[test]
    fn keep_firing_for_resets_if_the_trigger_matches_again() {
        let mgr = manager();
        mgr.add_rule(
            rule(Duration::from_secs(1), Duration::from_secs(5))
                .with_keep_firing_for(Duration::from_secs(10)),
        )
        .unwrap();
        let fp = fingerprint("high_cpu", &Labels::new());
        let t0 = Utc::now();

        mgr.process_metric("cpu_usage", 90.0, t0);
        mgr.process_metric("cpu_usage", 90.0, t0 + chrono::Duration::seconds(2));
        assert_eq!(mgr.alert_state(&fp), Some(AlertState::Firing));

        mgr.process_metric("cpu_usage", 10.0, t0 + chrono::Duration::seconds(5));
        assert_eq!(mgr.alert_state(&fp), Some(AlertState::Firing));

        // Matches again before the hysteresis window elapses: the
        // resolution countdown resets, so 6 more seconds isn't enough.
        mgr.process_metric("cpu_usage", 90.0, t0 + chrono::Duration::seconds(8));
        mgr.process_metric("cpu_usage", 10.0, t0 + chrono::Duration::seconds(14));
        assert_eq!(mgr.alert_state(&fp), Some(AlertState::Firing));
    }

    #[test]
    fn rate_of_change_trigger_uses_the_manager_clock_not_the_wall_clock() {
        let clock = Arc::new(crate::clock::FakeClock::new());
        let mgr = AlertManager::new_with_clock(
            AlertManagerConfig {
                enable_grouping: false,
                ..Default::default()
            },
            clock.clone(),
        )
        .unwrap();
        let r = Rule::new(
            "rising_latency",
            "latency_ms",
            Severity::Warning,
            Labels::new(),
            Annotations::new(),
            Trigger::RateOfChange(crate::triggers::RateOfChangeTrigger::new(
                Duration::from_millis(500),
                2,
                10.0,
                crate::triggers::RateDirection::Increasing,
            )),
            Duration::from_secs(1),
            Duration::from_nanos(1),
            Duration::from_secs(5),
        );
        mgr.add_rule(r).unwrap();
        let fp = fingerprint("rising_latency", &Labels::new());
        let t0 = Utc::now();

        mgr.process_metric("latency_ms", 10.0, t0);
        assert_eq!(mgr.alert_state(&fp), None);

        clock.advance(Duration::from_millis(500));
        mgr.process_metric("latency_ms", 80.0, t0 + chrono::Duration::milliseconds(1));
        assert_eq!(mgr.alert_state(&fp), Some(AlertState::Pending));

        clock.advance(Duration::from_millis(500));
        mgr.process_metric("latency_ms", 150.0, t0 + chrono::Duration::milliseconds(2));
        assert_eq!(mgr.alert_state(&fp), Some(AlertState::Firing));
    }

    #[test]
    fn silence_blocks_notification_but_preserves_state() {
        let mgr = manager();
        mgr.add_rule(rule(Duration::from_secs(30), Duration::from_secs(5))).unwrap();
        mgr.add_silence(Silence {
            id: Uuid::new_v4(),
            matchers: Labels::new(),
            starts_at: Utc::now() - chrono::Duration::seconds(10),
            ends_at: Utc::now() + chrono::Duration::seconds(10),
            comment: String::new(),
            creator: "test".to_string(),
        })
        .unwrap();
        let now = Utc::now();
        mgr.process_metric("cpu_usage", 90.0, now);
        let fp = fingerprint("high_cpu", &Labels::new());
        assert_eq!(mgr.alert_state(&fp), Some(AlertState::Suppressed));
        assert_eq!(mgr.metrics().alerts_suppressed.load(Ordering::Relaxed), 1);
    }
}
