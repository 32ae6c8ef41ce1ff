//! Routing sink: dispatches to the first matching, ready route.

use crate::alert::{Alert, AlertGroup, Severity};
use crate::error::{MonitorError, MonitorResult};
use crate::notifiers::Notifier;

pub type Predicate = Box<dyn Fn(&Alert) -> bool + Send + Sync>;

pub struct Route {
    pub predicate: Predicate,
    pub sink: Box<dyn Notifier>,
}

pub struct RoutingNotifier {
    name: String,
    routes: Vec<Route>,
    default: Option<Box<dyn Notifier>>,
}

impl RoutingNotifier {
    pub fn new(name: impl Into<String>, routes: Vec<Route>, default: Option<Box<dyn Notifier>>) -> Self {
        Self {
            name: name.into(),
            routes,
            default,
        }
    }

    /// Routes by exact severity match.
    pub fn by_severity(severity: Severity, sink: Box<dyn Notifier>) -> Route {
        Route {
            predicate: Box::new(move |alert| alert.severity == severity),
            sink,
        }
    }

    /// Routes by a label key/value match.
    pub fn by_label(key: impl Into<String>, value: impl Into<String>, sink: Box<dyn Notifier>) -> Route {
        let key = key.into();
        let value = value.into();
        Route {
            predicate: Box::new(move |alert| alert.labels.get(&key).map(String::as_str) == Some(value.as_str())),
            sink,
        }
    }

    fn pick(&self, alert: &Alert) -> Option<&dyn Notifier> {
        self.routes
            .iter()
            .find(|r| (r.predicate)(alert) && r.sink.is_ready())
            .map(|r| r.sink.as_ref())
            .or_else(|| self.default.as_deref().filter(|s| s.is_ready()))
    }
}

impl Notifier for RoutingNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_ready(&self) -> bool {
        self.routes.iter().any(|r| r.sink.is_ready()) || self.default.as_ref().is_some_and(|s| s.is_ready())
    }

    fn notify(&self, alert: &Alert) -> MonitorResult<()> {
        match self.pick(alert) {
            Some(sink) => sink.notify(alert),
            None => Err(MonitorError::not_found("no ready route for alert")),
        }
    }

    fn notify_group(&self, group: &AlertGroup) -> MonitorResult<()> {
        for alert in &group.alerts {
            self.notify(alert)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{Annotations, Labels};
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counting(&'static str, Arc<AtomicUsize>);
    impl Notifier for Counting {
        fn name(&self) -> &str {
            self.0
        }
        fn is_ready(&self) -> bool {
            true
        }
        fn notify(&self, _alert: &Alert) -> MonitorResult<()> {
            self.1.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn notify_group(&self, _group: &AlertGroup) -> MonitorResult<()> {
            Ok(())
        }
    }

    #[test]
    fn picks_first_matching_ready_route() {
        let critical_hits = Arc::new(AtomicUsize::new(0));
        let default_hits = Arc::new(AtomicUsize::new(0));
        let router = RoutingNotifier::new(
            "router",
            vec![RoutingNotifier::by_severity(
                Severity::Critical,
                Box::new(Counting("critical", critical_hits.clone())),
            )],
            Some(Box::new(Counting("default", default_hits.clone()))),
        );
        let alert = Alert::new(
            "x",
            "r",
            Labels::new(),
            Annotations::new(),
            Severity::Critical,
            1.0,
            Utc::now(),
        );
        router.notify(&alert).unwrap();
        assert_eq!(critical_hits.load(Ordering::SeqCst), 1);
        assert_eq!(default_hits.load(Ordering::SeqCst), 0);
    }
}
