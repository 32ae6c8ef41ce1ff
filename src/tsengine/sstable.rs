//! On-disk sorted string tables produced by flushing a sealed memtable or
//! by compacting a set of existing tables into the next level.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::cfg::Compression;
use crate::error::{MonitorError, MonitorResult};
use crate::tsengine::compression;
use crate::tsengine::memtable::TaggedPoint;

type SeriesData = BTreeMap<String, BTreeMap<DateTime<Utc>, TaggedPoint>>;

/// An immutable, on-disk table. Metadata (key/timestamp ranges) is kept in
/// memory so range queries can skip non-overlapping files without opening
/// them; the point data itself is read back from disk on demand.
pub struct SsTable {
    pub id: u64,
    pub level: usize,
    pub path: PathBuf,
    pub min_key: String,
    pub max_key: String,
    pub min_ts: DateTime<Utc>,
    pub max_ts: DateTime<Utc>,
    pub size_bytes: u64,
    pub entry_count: usize,
    pub series_ids: Vec<String>,
    compression: Compression,
}

impl SsTable {
    fn file_path(dir: &Path, level: usize, id: u64) -> PathBuf {
        dir.join(format!("L{level}")).join(format!("{id}.sst"))
    }

    /// Serializes `data`, compresses it, and writes it under
    /// `<dir>/L<level>/<id>.sst`, returning the resulting table's metadata.
    pub fn flush(
        dir: &Path,
        level: usize,
        id: u64,
        data: &SeriesData,
        compression: Compression,
    ) -> MonitorResult<Self> {
        if data.is_empty() {
            return Err(MonitorError::invalid_argument("cannot flush an empty sstable"));
        }
        let path = Self::file_path(dir, level, id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| MonitorError::StorageWriteFailed(format!("creating sstable dir: {e}")))?;
        }
        let encoded = serde_json::to_vec(data)
            .map_err(|e| MonitorError::StorageWriteFailed(format!("encoding sstable: {e}")))?;
        let compressed = compression::compress(compression, &encoded)?;
        fs::write(&path, &compressed)
            .map_err(|e| MonitorError::StorageWriteFailed(format!("writing sstable: {e}")))?;

        let mut min_key: Option<String> = None;
        let mut max_key: Option<String> = None;
        let mut min_ts: Option<DateTime<Utc>> = None;
        let mut max_ts: Option<DateTime<Utc>> = None;
        let mut entry_count = 0usize;
        let series_ids: Vec<String> = data.keys().cloned().collect();
        for (series_id, points) in data {
            min_key = Some(min_key.map_or_else(|| series_id.clone(), |m| std::cmp::min(m, series_id.clone())));
            max_key = Some(max_key.map_or_else(|| series_id.clone(), |m| std::cmp::max(m, series_id.clone())));
            entry_count += points.len();
            for ts in points.keys() {
                min_ts = Some(min_ts.map_or(*ts, |m| m.min(*ts)));
                max_ts = Some(max_ts.map_or(*ts, |m| m.max(*ts)));
            }
        }

        Ok(Self {
            id,
            level,
            path,
            min_key: min_key.unwrap_or_default(),
            max_key: max_key.unwrap_or_default(),
            min_ts: min_ts.unwrap_or_else(Utc::now),
            max_ts: max_ts.unwrap_or_else(Utc::now),
            size_bytes: compressed.len() as u64,
            entry_count,
            series_ids,
            compression,
        })
    }

    /// Whether this table's timestamp range could possibly contain any
    /// point in `[start, end]`; used to skip opening files during a query.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.min_ts <= end && self.max_ts >= start
    }

    pub fn has_series(&self, series_id: &str) -> bool {
        self.series_ids.iter().any(|s| s.as_str() == series_id)
    }

    fn load(&self) -> MonitorResult<SeriesData> {
        let compressed = fs::read(&self.path)
            .map_err(|e| MonitorError::StorageReadFailed(format!("reading sstable: {e}")))?;
        let decompressed = compression::decompress(self.compression, &compressed)?;
        serde_json::from_slice(&decompressed)
            .map_err(|e| MonitorError::StorageReadFailed(format!("decoding sstable: {e}")))
    }

    pub fn read_range(
        &self,
        series_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> MonitorResult<Vec<(DateTime<Utc>, f64, crate::alert::Labels)>> {
        if !self.overlaps(start, end) || !self.has_series(series_id) {
            return Ok(Vec::new());
        }
        let data = self.load()?;
        Ok(data
            .get(series_id)
            .map(|points| {
                points
                    .range(start..=end)
                    .map(|(ts, p)| (*ts, p.value, p.tags.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Full decoded contents, used by compaction to merge several tables.
    pub fn all_data(&self) -> MonitorResult<SeriesData> {
        self.load()
    }

    /// Rewrites this table in place retaining only points at or after
    /// `before`, used by `delete_before` for tables that only partially
    /// fall out of retention. Returns `None` if the rewrite left the table
    /// empty, signalling the caller should drop it entirely.
    pub fn rewrite_retaining_from(&self, before: DateTime<Utc>) -> MonitorResult<Option<Self>> {
        let mut data = self.load()?;
        data.retain(|_, points| {
            points.retain(|ts, _| *ts >= before);
            !points.is_empty()
        });
        if data.is_empty() {
            let _ = fs::remove_file(&self.path);
            return Ok(None);
        }
        let dir = self
            .path
            .parent()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::flush(&dir, self.level, self.id, &data, self.compression).map(Some)
    }

    pub fn delete_file(&self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::Labels;
    use crate::tsengine::memtable::Memtable;

    fn sample_data() -> SeriesData {
        let mt = Memtable::new();
        let t0 = Utc::now();
        mt.insert("cpu{}", t0, 1.0, Labels::new());
        mt.insert("cpu{}", t0 + chrono::Duration::seconds(1), 2.0, Labels::new());
        mt.snapshot()
    }

    #[test]
    fn flush_and_read_range_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let data = sample_data();
        let table = SsTable::flush(dir.path(), 0, 1, &data, Compression::None).unwrap();
        assert_eq!(table.entry_count, 2);
        let t0 = *data["cpu{}"].keys().next().unwrap();
        let points = table.read_range("cpu{}", t0 - chrono::Duration::seconds(1), t0 + chrono::Duration::seconds(5)).unwrap();
        assert_eq!(points.len(), 2);
    }

    #[test]
    fn non_overlapping_range_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let data = sample_data();
        let table = SsTable::flush(dir.path(), 0, 1, &data, Compression::Zstd).unwrap();
        let far_future = Utc::now() + chrono::Duration::days(365);
        let points = table.read_range("cpu{}", far_future, far_future + chrono::Duration::seconds(1)).unwrap();
        assert!(points.is_empty());
    }

    #[test]
    fn rewrite_retaining_from_drops_old_points() {
        let dir = tempfile::tempdir().unwrap();
        let data = sample_data();
        let table = SsTable::flush(dir.path(), 0, 1, &data, Compression::None).unwrap();
        let cutoff = table.max_ts;
        let rewritten = table.rewrite_retaining_from(cutoff).unwrap().unwrap();
        assert_eq!(rewritten.entry_count, 1);
    }
}
