//! Core alert entities: labels, severity, state machine, alert, group, silence.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Alert labels and common labels are sorted maps so fingerprints are
/// deterministic regardless of insertion order.
pub type Labels = BTreeMap<String, String>;
pub type Annotations = BTreeMap<String, String>;

/// Severity ordering drives inhibition priority and a group's max severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Info
    }
}

/// An alert's position in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertState {
    Inactive,
    Pending,
    Firing,
    Resolved,
    Suppressed,
}

impl std::fmt::Display for AlertState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertState::Inactive => write!(f, "inactive"),
            AlertState::Pending => write!(f, "pending"),
            AlertState::Firing => write!(f, "firing"),
            AlertState::Resolved => write!(f, "resolved"),
            AlertState::Suppressed => write!(f, "suppressed"),
        }
    }
}

impl AlertState {
    /// Whether `self -> next` is a transition the state machine allows.
    /// `Suppressed` is reachable from, and returns to, any other state, so
    /// it is handled separately by the caller rather than listed here.
    pub fn can_transition_to(self, next: AlertState) -> bool {
        use AlertState::*;
        matches!(
            (self, next),
            (Inactive, Pending)
                | (Pending, Firing)
                | (Pending, Inactive)
                | (Firing, Resolved)
                | (Resolved, Pending)
        )
    }
}

/// Builds the canonical `name{sorted_key=value,...}` fingerprint used as an
/// alert's identity while it is active.
pub fn fingerprint(name: &str, labels: &Labels) -> String {
    let mut body = String::new();
    for (i, (k, v)) in labels.iter().enumerate() {
        if i > 0 {
            body.push(',');
        }
        body.push_str(k);
        body.push('=');
        body.push_str(v);
    }
    format!("{name}{{{body}}}")
}

/// A single alert instance, tracked from first match through resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub name: String,
    pub rule_name: String,
    pub labels: Labels,
    pub annotations: Annotations,
    pub severity: Severity,
    pub state: AlertState,
    pub prior_state: Option<AlertState>,
    pub value: f64,
    pub group_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Alert {
    pub fn new(
        name: impl Into<String>,
        rule_name: impl Into<String>,
        labels: Labels,
        annotations: Annotations,
        severity: Severity,
        value: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            rule_name: rule_name.into(),
            labels,
            annotations,
            severity,
            state: AlertState::Inactive,
            prior_state: None,
            value,
            group_key: String::new(),
            created_at: now,
            updated_at: now,
            started_at: None,
            resolved_at: None,
        }
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(&self.name, &self.labels)
    }

    /// Attempts the transition, applying timestamp side effects. Returns
    /// `false` and leaves state untouched if the transition is illegal.
    pub fn transition_to(&mut self, next: AlertState, now: DateTime<Utc>) -> bool {
        if next == AlertState::Suppressed {
            self.prior_state = Some(self.state);
            self.state = AlertState::Suppressed;
            self.updated_at = now;
            return true;
        }
        if self.state == AlertState::Suppressed {
            // Returning from suppression goes back to whatever state was
            // preserved, regardless of what the caller asked for.
            if let Some(prior) = self.prior_state.take() {
                self.state = prior;
                self.updated_at = now;
                return true;
            }
            return false;
        }
        if !self.state.can_transition_to(next) {
            return false;
        }
        self.state = next;
        self.updated_at = now;
        if next == AlertState::Firing {
            self.started_at.get_or_insert(now);
        }
        if next == AlertState::Resolved {
            self.resolved_at = Some(now);
        }
        true
    }
}

/// A collection of alerts sharing a group key, per the aggregator.
#[derive(Debug, Clone)]
pub struct AlertGroup {
    pub group_key: String,
    pub common_labels: Labels,
    pub alerts: Vec<Alert>,
    pub first_seen: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_sent: Option<DateTime<Utc>>,
}

impl AlertGroup {
    pub fn max_severity(&self) -> Option<Severity> {
        self.alerts.iter().map(|a| a.severity).max()
    }
}

/// A user-created silence window.
#[derive(Debug, Clone)]
pub struct Silence {
    pub id: Uuid,
    pub matchers: Labels,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub comment: String,
    pub creator: String,
}

impl Silence {
    /// Matches iff every matcher label is present with an equal value on the
    /// alert, and `now` falls inside `[starts_at, ends_at)`.
    pub fn matches(&self, labels: &Labels, now: DateTime<Utc>) -> bool {
        if now < self.starts_at || now >= self.ends_at {
            return false;
        }
        self.matchers
            .iter()
            .all(|(k, v)| labels.get(k) == Some(v))
    }
}

/// Static configuration describing which firing alerts suppress which
/// targets.
#[derive(Debug, Clone)]
pub struct InhibitionRule {
    pub source_match: Labels,
    pub target_match: Labels,
    pub equal: Vec<String>,
}

impl InhibitionRule {
    /// `src` must be firing and match `source_match`; `tgt` must match
    /// `target_match` and agree with `src` on every `equal` label.
    /// Self-inhibition (identical fingerprint) is excluded by the caller.
    pub fn should_inhibit(&self, src: &Alert, tgt: &Alert) -> bool {
        if src.state != AlertState::Firing {
            return false;
        }
        if src.fingerprint() == tgt.fingerprint() {
            return false;
        }
        let matches = |matcher: &Labels, labels: &Labels| {
            matcher.iter().all(|(k, v)| labels.get(k) == Some(v))
        };
        if !matches(&self.source_match, &src.labels) {
            return false;
        }
        if !matches(&self.target_match, &tgt.labels) {
            return false;
        }
        self.equal
            .iter()
            .all(|label| src.labels.get(label) == tgt.labels.get(label))
    }
}
