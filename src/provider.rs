//! Collaborator contracts the core consumes but does not implement:
//! platform metric readers, the per-tick metric provider callback, the
//! logger interface, and the optional event bus. Concrete OS-specific
//! implementations are out of scope; this crate defines the trait and a
//! null implementation for tests.

use std::sync::Mutex;

/// One tick's worth of OS-level readings. Every field is optional because
/// a given platform/reader may not expose it; `None` means "not
/// available", not zero.
#[derive(Debug, Clone, Default)]
pub struct PlatformSnapshot {
    pub cpu_usage_percent: Option<f64>,
    pub memory_usage_percent: Option<f64>,
    pub battery_percent: Option<f64>,
    pub temperature_celsius: Option<f64>,
    pub uptime_seconds: Option<u64>,
    pub context_switches: Option<u64>,
    pub open_file_descriptors: Option<u64>,
    pub interrupts: Option<u64>,
}

/// A platform metrics source. The core consumes only this trait; it never
/// parses OS-specific structures itself.
pub trait PlatformMetricsProvider: Send + Sync {
    fn snapshot(&self) -> PlatformSnapshot;
}

/// Default provider used in tests and wherever no real platform reader is
/// wired up: every field reports unavailable.
pub struct NullPlatformProvider;

impl PlatformMetricsProvider for NullPlatformProvider {
    fn snapshot(&self) -> PlatformSnapshot {
        PlatformSnapshot::default()
    }
}

/// Per-tick metric lookup the evaluation worker calls once per enabled
/// rule's metric name. `None` means no value is available this tick; the
/// rule is skipped, not failed.
pub trait MetricProvider: Send + Sync {
    fn value_for(&self, metric_name: &str) -> Option<f64>;
}

/// A provider backed by a plain closure, for callers who don't need a
/// full trait implementation.
pub struct ClosureMetricProvider<F>(pub F)
where
    F: Fn(&str) -> Option<f64> + Send + Sync;

impl<F> MetricProvider for ClosureMetricProvider<F>
where
    F: Fn(&str) -> Option<f64> + Send + Sync,
{
    fn value_for(&self, metric_name: &str) -> Option<f64> {
        (self.0)(metric_name)
    }
}

/// Minimal logging contract, for callers embedding this crate in an
/// environment with its own logging sink rather than `tracing`'s global
/// subscriber.
pub trait Logger: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Forwards to `tracing`, matching the rest of the crate's logging.
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!("{message}"),
            LogLevel::Info => tracing::info!("{message}"),
            LogLevel::Warn => tracing::warn!("{message}"),
            LogLevel::Error => tracing::error!("{message}"),
        }
    }
}

/// Optional event bus used by adapters to forward state changes
/// (e.g. alert transitions) to an external subscriber.
pub trait EventBus: Send + Sync {
    fn publish(&self, event: &str);
}

/// In-memory event bus that just records published events; useful as a
/// test double and as a no-op default.
#[derive(Default)]
pub struct RecordingEventBus {
    events: Mutex<Vec<String>>,
}

impl EventBus for RecordingEventBus {
    fn publish(&self, event: &str) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.to_string());
    }
}

impl RecordingEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_provider_reports_everything_unavailable() {
        let snap = NullPlatformProvider.snapshot();
        assert!(snap.cpu_usage_percent.is_none());
    }

    #[test]
    fn closure_provider_forwards_to_the_closure() {
        let provider = ClosureMetricProvider(|name: &str| if name == "cpu" { Some(42.0) } else { None });
        assert_eq!(provider.value_for("cpu"), Some(42.0));
        assert_eq!(provider.value_for("mem"), None);
    }

    #[test]
    fn recording_event_bus_keeps_publish_order() {
        let bus = RecordingEventBus::new();
        bus.publish("a");
        bus.publish("b");
        assert_eq!(bus.events(), vec!["a".to_string(), "b".to_string()]);
    }
}
