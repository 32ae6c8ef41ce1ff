//! monitor-core: an embedded application monitoring engine.
//!
//! Provides metric primitives (counters, gauges, histograms, summaries,
//! timers), a time-series storage engine with LSM-style compaction, an
//! alert model and rule evaluation pipeline, pluggable notification sinks,
//! and an adaptive collection controller that trades sampling fidelity for
//! load under pressure.
//!
//! ## Layout
//!
//! - [`metrics`] — the metric primitives themselves.
//! - [`tsengine`] — durable per-series storage (WAL, memtable, SSTable,
//!   compaction, tag index, query cache).
//! - [`database`] — partitioning, retention, and connection pooling on top
//!   of [`tsengine`].
//! - [`triggers`] — the condition functions a [`rules::Rule`] evaluates.
//! - [`alert`] — the alert data model and state machine.
//! - [`dispatch`] — grouping, deduplication, cooldown, and inhibition.
//! - [`notifiers`] — pluggable notification sinks.
//! - [`manager`] — the orchestrator tying rules, triggers, dispatch, and
//!   notifiers into a running evaluation loop.
//! - [`adaptive`] — load-based collection throttling.

pub mod adaptive;
pub mod alert;
pub mod cfg;
pub mod clock;
pub mod database;
pub mod dispatch;
pub mod error;
pub mod manager;
pub mod metrics;
pub mod notifiers;
pub mod provider;
pub mod rules;
#[cfg(feature = "test-utils")]
pub mod test_support;
pub mod triggers;
pub mod tsengine;

pub use alert::{
    fingerprint, Alert, AlertGroup, AlertState, Annotations, InhibitionRule, Labels, Severity,
    Silence,
};
pub use clock::{Clock, FakeClock, SystemClock};
pub use database::MetricDatabase;
pub use error::{MonitorError, MonitorResult};
pub use manager::{AlertManager, AlertManagerConfig, AlertManagerMetrics};
pub use metrics::{
    Counter, Gauge, Histogram, MetricKind, MetricRecord, SampleValue, ScopedTimer, Summary, Timer,
};
pub use provider::{LogLevel, Logger, MetricProvider, PlatformMetricsProvider, PlatformSnapshot};
pub use rules::Rule;
pub use triggers::Trigger;
pub use tsengine::TimeSeriesEngine;
