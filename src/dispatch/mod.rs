//! Post-evaluation dispatch pipeline: grouping, deduplication, cooldown,
//! and inhibition, applied in that order before an alert reaches notifiers.

mod aggregator;
mod cooldown;
mod dedup;
mod inhibitor;

pub use aggregator::{compute_group_key, Aggregator, AggregatorConfig};
pub use cooldown::CooldownTracker;
pub use dedup::Deduplicator;
pub use inhibitor::Inhibitor;
