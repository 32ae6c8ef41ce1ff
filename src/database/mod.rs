//! Metric database: a partitioning layer over the time-series engine with
//! retention sweeping, a connection pool, and an optional distributed
//! shard coordinator.

mod database;
mod index;
mod partition;
mod pool;
mod retention;
mod shard;

pub use database::MetricDatabase;
pub use index::{MetricIndex, MetricIndexEntry};
pub use partition::{partition_id_for, Partition};
pub use pool::{Lease, Pool, PoolMetrics};
pub use shard::ShardCoordinator;
