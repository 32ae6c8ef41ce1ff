//! Adaptive collection control: load-based interval/sampling throttling.

mod controller;
mod monitor;

pub use controller::{AdaptationStats, AdaptiveCollector, AdaptiveConfig, AdaptiveStrategy, LoadLevel};
pub use monitor::AdaptiveMonitor;
