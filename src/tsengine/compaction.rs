//! Merges adjacent SSTables into the next level. Leveled compaction: once
//! a level holds `level0_file_num_compaction_trigger` (level 0) or simply
//! accumulates files (L1+, size-tiered), a background worker merges the
//! whole set into one table one level down and the output atomically
//! replaces the inputs.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::cfg::Compression;
use crate::error::MonitorResult;
use crate::tsengine::sstable::SsTable;

/// Whether level 0 has accumulated enough files to trigger a compaction
/// round, per `level0_file_num_compaction_trigger`.
pub fn should_compact_level0(level0_file_count: usize, trigger: usize) -> bool {
    level0_file_count >= trigger
}

/// Merges every table in `inputs` into a single new table at
/// `next_level`, keeping the newest value when two inputs disagree on the
/// same `(series, timestamp)` pair (inputs ordered oldest-first).
pub fn compact(
    inputs: &[Arc<SsTable>],
    dir: &Path,
    next_level: usize,
    next_id: u64,
    compression: Compression,
) -> MonitorResult<SsTable> {
    let mut merged: BTreeMap<String, BTreeMap<chrono::DateTime<chrono::Utc>, crate::tsengine::memtable::TaggedPoint>> =
        BTreeMap::new();
    for table in inputs {
        let data = table.all_data()?;
        for (series_id, points) in data {
            merged.entry(series_id).or_default().extend(points);
        }
    }
    SsTable::flush(dir, next_level, next_id, &merged, compression)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::Labels;
    use crate::tsengine::memtable::Memtable;
    use chrono::Utc;

    #[test]
    fn level0_trigger_respects_configured_count() {
        assert!(!should_compact_level0(3, 4));
        assert!(should_compact_level0(4, 4));
    }

    #[test]
    fn compact_merges_disjoint_inputs_and_newer_wins_on_overlap() {
        let dir = tempfile::tempdir().unwrap();
        let t0 = Utc::now();

        let mt_a = Memtable::new();
        mt_a.insert("cpu{}", t0, 1.0, Labels::new());
        let table_a = Arc::new(SsTable::flush(dir.path(), 0, 1, &mt_a.snapshot(), Compression::None).unwrap());

        let mt_b = Memtable::new();
        mt_b.insert("cpu{}", t0, 2.0, Labels::new());
        mt_b.insert("mem{}", t0, 50.0, Labels::new());
        let table_b = Arc::new(SsTable::flush(dir.path(), 0, 2, &mt_b.snapshot(), Compression::None).unwrap());

        let merged = compact(&[table_a, table_b], dir.path(), 1, 1, Compression::None).unwrap();
        assert_eq!(merged.level, 1);
        assert_eq!(merged.series_ids.len(), 2);
        let points = merged.read_range("cpu{}", t0 - chrono::Duration::seconds(1), t0 + chrono::Duration::seconds(1)).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].1, 2.0);
    }
}
