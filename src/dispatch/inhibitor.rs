//! Inhibition: suppresses target alerts while a matching source alert fires.

use crate::alert::{Alert, InhibitionRule};

pub struct Inhibitor {
    rules: Vec<InhibitionRule>,
}

impl Inhibitor {
    pub fn new(rules: Vec<InhibitionRule>) -> Self {
        Self { rules }
    }

    /// `true` iff any rule's source side matches a currently firing alert
    /// in `all_alerts` that also satisfies the rule's equal-labels
    /// constraint against `candidate`.
    pub fn is_inhibited(&self, candidate: &Alert, all_alerts: &[Alert]) -> bool {
        self.rules.iter().any(|rule| {
            all_alerts
                .iter()
                .any(|source| rule.should_inhibit(source, candidate))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{AlertState, Annotations, Labels, Severity};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect::<BTreeMap<_, _>>()
    }

    #[test]
    fn firing_source_inhibits_matching_target() {
        let now = Utc::now();
        let mut source = Alert::new(
            "node_down",
            "node_down",
            labels(&[("node", "a"), ("severity", "critical")]),
            Annotations::new(),
            Severity::Critical,
            1.0,
            now,
        );
        source.transition_to(AlertState::Pending, now);
        source.transition_to(AlertState::Firing, now);

        let target = Alert::new(
            "high_latency",
            "high_latency",
            labels(&[("node", "a")]),
            Annotations::new(),
            Severity::Warning,
            1.0,
            now,
        );

        let rule = InhibitionRule {
            source_match: labels(&[("severity", "critical")]),
            target_match: Labels::new(),
            equal: vec!["node".to_string()],
        };
        let inhibitor = Inhibitor::new(vec![rule]);
        assert!(inhibitor.is_inhibited(&target, &[source]));
    }

    #[test]
    fn non_firing_source_does_not_inhibit() {
        let now = Utc::now();
        let source = Alert::new(
            "node_down",
            "node_down",
            labels(&[("node", "a")]),
            Annotations::new(),
            Severity::Critical,
            1.0,
            now,
        );
        let target = Alert::new(
            "high_latency",
            "high_latency",
            labels(&[("node", "a")]),
            Annotations::new(),
            Severity::Warning,
            1.0,
            now,
        );
        let rule = InhibitionRule {
            source_match: Labels::new(),
            target_match: Labels::new(),
            equal: vec!["node".to_string()],
        };
        let inhibitor = Inhibitor::new(vec![rule]);
        assert!(!inhibitor.is_inhibited(&target, &[source]));
    }
}
