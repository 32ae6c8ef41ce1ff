//! Alert rule definitions.

use std::time::Duration;

use crate::alert::{Annotations, Labels, Severity};
use crate::error::{MonitorError, MonitorResult};
use crate::triggers::Trigger;

/// A registered alerting rule: a name, the metric it watches, a trigger,
/// and the timings that drive the alert state machine.
pub struct Rule {
    pub name: String,
    pub metric_name: String,
    pub severity: Severity,
    pub labels: Labels,
    pub annotations: Annotations,
    pub trigger: Trigger,
    pub evaluation_interval: Duration,
    pub for_duration: Duration,
    pub repeat_interval: Duration,
    /// Optional hysteresis on resolution: once `Firing`, the alert keeps
    /// firing for this long after the trigger stops matching before it is
    /// allowed to transition to `Resolved`. Zero (the default) disables the
    /// hysteresis and resolves on the first non-matching evaluation, as in
    /// the base state machine in §3.
    pub keep_firing_for: Duration,
    pub enabled: bool,
}

impl Rule {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        metric_name: impl Into<String>,
        severity: Severity,
        labels: Labels,
        annotations: Annotations,
        trigger: Trigger,
        evaluation_interval: Duration,
        for_duration: Duration,
        repeat_interval: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            metric_name: metric_name.into(),
            severity,
            labels,
            annotations,
            trigger,
            evaluation_interval,
            for_duration,
            repeat_interval,
            keep_firing_for: Duration::ZERO,
            enabled: true,
        }
    }

    /// Sets the keep-firing-for hysteresis (see the field doc). Builder
    /// style, matching `ThresholdTrigger::with_epsilon` elsewhere in this
    /// crate.
    pub fn with_keep_firing_for(mut self, keep_firing_for: Duration) -> Self {
        self.keep_firing_for = keep_firing_for;
        self
    }

    /// Validates the invariants `add_rule` must enforce: non-empty name,
    /// non-empty metric name, and every timing strictly positive.
    pub fn validate(&self) -> MonitorResult<()> {
        if self.name.trim().is_empty() {
            return Err(MonitorError::invalid_argument("rule name must not be empty"));
        }
        if self.metric_name.trim().is_empty() {
            return Err(MonitorError::invalid_argument(
                "rule metric name must not be empty",
            ));
        }
        if self.evaluation_interval.is_zero() {
            return Err(MonitorError::invalid_configuration(
                "evaluation_interval must be > 0",
            ));
        }
        if self.for_duration.is_zero() {
            return Err(MonitorError::invalid_configuration(
                "for_duration must be > 0",
            ));
        }
        if self.repeat_interval.is_zero() {
            return Err(MonitorError::invalid_configuration(
                "repeat_interval must be > 0",
            ));
        }
        Ok(())
    }
}
