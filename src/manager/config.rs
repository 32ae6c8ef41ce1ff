//! Alert manager configuration.

use std::time::Duration;

use crate::error::{MonitorError, MonitorResult};

#[derive(Debug, Clone)]
pub struct AlertManagerConfig {
    pub default_evaluation_interval: Duration,
    pub default_repeat_interval: Duration,
    pub max_alerts_per_rule: usize,
    pub max_silences: usize,
    pub enable_grouping: bool,
    pub group_wait: Duration,
    pub group_interval: Duration,
    pub resolve_timeout: Duration,
    /// Labels the aggregator groups alerts by, in declared order; an empty
    /// list falls back to grouping by rule name (see
    /// `dispatch::compute_group_key`).
    pub group_by_labels: Vec<String>,
    pub dedup_cache_duration: Duration,
    pub default_cooldown: Duration,
}

impl Default for AlertManagerConfig {
    fn default() -> Self {
        Self {
            default_evaluation_interval: Duration::from_secs(10),
            default_repeat_interval: Duration::from_secs(300),
            max_alerts_per_rule: 1000,
            max_silences: 1000,
            enable_grouping: true,
            group_wait: Duration::from_secs(30),
            group_interval: Duration::from_secs(300),
            resolve_timeout: Duration::from_secs(300),
            group_by_labels: Vec::new(),
            dedup_cache_duration: Duration::from_secs(60),
            default_cooldown: Duration::from_secs(60),
        }
    }
}

impl AlertManagerConfig {
    pub fn validate(&self) -> MonitorResult<()> {
        if self.default_evaluation_interval.is_zero() {
            return Err(MonitorError::invalid_configuration(
                "default_evaluation_interval must be > 0",
            ));
        }
        if self.max_alerts_per_rule == 0 {
            return Err(MonitorError::invalid_configuration(
                "max_alerts_per_rule must be > 0",
            ));
        }
        if self.max_silences == 0 {
            return Err(MonitorError::invalid_configuration("max_silences must be > 0"));
        }
        Ok(())
    }
}

/// Atomic counters surfaced for observability, matching the counters the
/// error design calls out by name.
#[derive(Debug, Default)]
pub struct AlertManagerMetrics {
    pub evaluations: std::sync::atomic::AtomicU64,
    pub notifications_sent: std::sync::atomic::AtomicU64,
    pub notifications_failed: std::sync::atomic::AtomicU64,
    pub collection_errors: std::sync::atomic::AtomicU64,
    pub alerts_suppressed: std::sync::atomic::AtomicU64,
}
