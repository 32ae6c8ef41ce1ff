//! LSM-like time-series storage engine: write-ahead log, memtables,
//! SSTables, compaction, a tag index for query routing, and a result
//! cache.

mod compaction;
mod compression;
mod engine;
mod memtable;
mod query_cache;
mod sstable;
mod tag_index;
mod wal;

pub use engine::{series_id, AggregationFn, TimeSeriesEngine};
pub use memtable::{Memtable, TaggedPoint};
pub use sstable::SsTable;
pub use wal::{Wal, WalRecord};
