//! The time-series engine: append-only ingest into an active memtable,
//! rollover to immutable memtables, background flush to Level 0 SSTables,
//! background compaction, and merged range/aggregation reads across all
//! three tiers.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::thread::JoinHandle;

use chrono::{DateTime, Utc};

use crate::alert::{fingerprint, Labels};
use crate::cfg::StorageConfig;
use crate::error::{MonitorError, MonitorResult};
use crate::tsengine::compaction;
use crate::tsengine::memtable::Memtable;
use crate::tsengine::query_cache::QueryCache;
use crate::tsengine::sstable::SsTable;
use crate::tsengine::tag_index::TagIndex;
use crate::tsengine::wal::{Wal, WalRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationFn {
    Avg,
    Sum,
    Min,
    Max,
    Count,
}

/// Computes `series_id = name{sorted_tag_string}`, matching the alert
/// fingerprint format so a series and an alert labelled the same way read
/// identically in logs and dashboards.
pub fn series_id(name: &str, tags: &Labels) -> String {
    fingerprint(name, tags)
}

/// Append-only, LSM-like store for one partition's worth of metric
/// history. A [`crate::database`] partition owns exactly one of these.
pub struct TimeSeriesEngine {
    config: StorageConfig,
    wal: Mutex<Wal>,
    active: RwLock<Arc<Memtable>>,
    immutable: RwLock<VecDeque<Arc<Memtable>>>,
    levels: RwLock<Vec<Vec<Arc<SsTable>>>>,
    tag_index: TagIndex,
    query_cache: QueryCache,
    next_sstable_id: AtomicU64,
    running: Arc<std::sync::atomic::AtomicBool>,
    wake: Arc<Condvar>,
    wake_lock: Arc<Mutex<()>>,
    flush_worker: Mutex<Option<JoinHandle<()>>>,
    compaction_worker: Mutex<Option<JoinHandle<()>>>,
}

impl TimeSeriesEngine {
    pub fn new(config: StorageConfig) -> MonitorResult<Arc<Self>> {
        config.validate()?;
        std::fs::create_dir_all(&config.data_directory)
            .map_err(|e| MonitorError::StorageWriteFailed(format!("creating data dir: {e}")))?;
        let wal = Wal::open(&config.wal_directory, config.sync_writes)?;
        Ok(Arc::new(Self {
            wal: Mutex::new(wal),
            active: RwLock::new(Arc::new(Memtable::new())),
            immutable: RwLock::new(VecDeque::new()),
            levels: RwLock::new(Vec::new()),
            tag_index: TagIndex::new(),
            query_cache: QueryCache::new(1000, std::time::Duration::from_secs(30)),
            next_sstable_id: AtomicU64::new(1),
            running: Arc::new(std::sync::atomic::AtomicBool::new(false)),
            wake: Arc::new(Condvar::new()),
            wake_lock: Arc::new(Mutex::new(())),
            flush_worker: Mutex::new(None),
            compaction_worker: Mutex::new(None),
            config,
        }))
    }

    /// Appends one sample: WAL first, then the active memtable, then the
    /// tag index. Seals the active memtable if it has hit its size or age
    /// cap.
    pub fn write(&self, name: &str, value: f64, ts: DateTime<Utc>, tags: Labels) -> MonitorResult<()> {
        let sid = series_id(name, &tags);
        {
            let mut wal = self.wal.lock().unwrap_or_else(|e| e.into_inner());
            wal.append(&WalRecord {
                series_id: sid.clone(),
                timestamp: ts,
                value,
                tags: tags.clone(),
            })?;
        }
        let active = self.active.read().unwrap_or_else(|e| e.into_inner()).clone();
        active.insert(&sid, ts, value, tags.clone());
        self.tag_index.record(name, &sid, &tags);
        self.query_cache.invalidate_all();

        if active.is_full(self.config.memtable_size_bytes, self.seal_age()) {
            self.seal_active();
        }
        Ok(())
    }

    fn seal_age(&self) -> std::time::Duration {
        // Memtables are also sealed once they age out, bounded by how long
        // a flush cycle is allowed to lag; reuse the compaction interval
        // scale as a reasonable default age cap.
        std::time::Duration::from_secs(3600)
    }

    /// Writes a batch of metric records, grouping by series for
    /// throughput. Only records with a numeric value are written; returns
    /// the count actually written.
    pub fn write_batch(&self, records: &[crate::metrics::MetricRecord]) -> MonitorResult<usize> {
        let mut written = 0;
        for record in records {
            if let Some(value) = record.value.as_f64() {
                self.write(&record.name, value, record.timestamp, record.labels.clone())?;
                written += 1;
            }
        }
        Ok(written)
    }

    fn seal_active(&self) {
        let mut active = self.active.write().unwrap_or_else(|e| e.into_inner());
        if active.is_empty() {
            return;
        }
        let sealed = std::mem::replace(&mut *active, Arc::new(Memtable::new()));
        drop(active);
        self.immutable.write().unwrap_or_else(|e| e.into_inner()).push_back(sealed);
        self.wake.notify_all();

        // Backpressure: if the immutable queue has backed up past
        // max_memtables, flush synchronously instead of waiting for the
        // background worker's next tick.
        while self.immutable.read().unwrap_or_else(|e| e.into_inner()).len() > self.config.max_memtables {
            if !self.flush_oldest_immutable().unwrap_or(false) {
                break;
            }
        }
    }

    /// Picks the oldest immutable memtable and flushes it to a new Level 0
    /// SSTable. Returns whether a flush happened.
    fn flush_oldest_immutable(&self) -> MonitorResult<bool> {
        let oldest = {
            let mut immutable = self.immutable.write().unwrap_or_else(|e| e.into_inner());
            immutable.pop_front()
        };
        let Some(memtable) = oldest else { return Ok(false) };
        let data = memtable.snapshot();
        if data.is_empty() {
            return Ok(false);
        }
        let id = self.next_sstable_id.fetch_add(1, Ordering::SeqCst);
        let table = SsTable::flush(&self.config.data_directory, 0, id, &data, self.config.compression)?;
        let mut levels = self.levels.write().unwrap_or_else(|e| e.into_inner());
        if levels.is_empty() {
            levels.push(Vec::new());
        }
        levels[0].push(Arc::new(table));
        Ok(true)
    }

    fn maybe_compact_level0(&self) -> MonitorResult<bool> {
        let inputs = {
            let levels = self.levels.read().unwrap_or_else(|e| e.into_inner());
            let Some(level0) = levels.first() else { return Ok(false) };
            if !compaction::should_compact_level0(
                level0.len(),
                self.config.level0_file_num_compaction_trigger,
            ) {
                return Ok(false);
            }
            level0.clone()
        };
        if inputs.is_empty() {
            return Ok(false);
        }
        let id = self.next_sstable_id.fetch_add(1, Ordering::SeqCst);
        let merged = compaction::compact(&inputs, &self.config.data_directory, 1, id, self.config.compression)?;

        let mut levels = self.levels.write().unwrap_or_else(|e| e.into_inner());
        levels[0].clear();
        if levels.len() < 2 {
            levels.push(Vec::new());
        }
        levels[1].push(Arc::new(merged));
        drop(levels);
        for input in &inputs {
            input.delete_file();
        }
        Ok(true)
    }

    /// Merges the active memtable, every immutable memtable, and every
    /// overlapping SSTable across all levels for one series. Ties on an
    /// identical timestamp favor the newer tier (active over immutable
    /// over on-disk).
    pub fn read_range(
        &self,
        series_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> MonitorResult<Vec<(DateTime<Utc>, f64, Labels)>> {
        let mut merged: BTreeMap<DateTime<Utc>, (f64, Labels)> = BTreeMap::new();

        {
            let levels = self.levels.read().unwrap_or_else(|e| e.into_inner());
            for level in levels.iter() {
                for table in level {
                    if table.overlaps(start, end) {
                        for (ts, v, tags) in table.read_range(series_id, start, end)? {
                            merged.insert(ts, (v, tags));
                        }
                    }
                }
            }
        }
        {
            let immutable = self.immutable.read().unwrap_or_else(|e| e.into_inner());
            for memtable in immutable.iter() {
                for (ts, v, tags) in memtable.read_range(series_id, start, end) {
                    merged.insert(ts, (v, tags));
                }
            }
        }
        {
            let active = self.active.read().unwrap_or_else(|e| e.into_inner()).clone();
            for (ts, v, tags) in active.read_range(series_id, start, end) {
                merged.insert(ts, (v, tags));
            }
        }

        Ok(merged.into_iter().map(|(ts, (v, tags))| (ts, v, tags)).collect())
    }

    /// Enumerates candidate series via the tag index, merges their
    /// `read_range` outputs, and returns the combined points sorted by
    /// timestamp. Backed by the query cache.
    pub fn query(
        &self,
        name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        tag_filter: &Labels,
    ) -> MonitorResult<Vec<(DateTime<Utc>, f64, Labels)>> {
        if let Some(cached) = self.query_cache.get(name, start, end, tag_filter) {
            return Ok(cached);
        }
        let candidates = self.tag_index.series_for(name, tag_filter);
        let mut all = Vec::new();
        for sid in candidates {
            all.extend(self.read_range(&sid, start, end)?);
        }
        all.sort_by_key(|(ts, _, _)| *ts);
        self.query_cache.put(name, start, end, tag_filter, all.clone());
        Ok(all)
    }

    /// Downsamples a query's result into fixed-width buckets, reducing
    /// each with `func`.
    pub fn aggregate(
        &self,
        name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        tag_filter: &Labels,
        interval: chrono::Duration,
        func: AggregationFn,
    ) -> MonitorResult<Vec<(DateTime<Utc>, f64)>> {
        if interval <= chrono::Duration::zero() {
            return Err(MonitorError::invalid_argument("aggregation interval must be > 0"));
        }
        let points = self.query(name, start, end, tag_filter)?;
        let mut buckets: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
        let interval_ms = interval.num_milliseconds().max(1);
        for (ts, v, _) in &points {
            let bucket = ts.timestamp_millis() / interval_ms;
            buckets.entry(bucket).or_default().push(*v);
        }
        Ok(buckets
            .into_iter()
            .map(|(bucket, values)| {
                let ts = DateTime::<Utc>::from_timestamp_millis(bucket * interval_ms).unwrap_or(start);
                let reduced = match func {
                    AggregationFn::Avg => values.iter().sum::<f64>() / values.len() as f64,
                    AggregationFn::Sum => values.iter().sum(),
                    AggregationFn::Min => values.iter().cloned().fold(f64::INFINITY, f64::min),
                    AggregationFn::Max => values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
                    AggregationFn::Count => values.len() as f64,
                };
                (ts, reduced)
            })
            .collect())
    }

    /// Purges every point with a timestamp before `before`, across the
    /// active memtable, immutable memtables, and on-disk SSTables. Tables
    /// that fall entirely before the cutoff are dropped outright; tables
    /// that straddle it are rewritten.
    pub fn delete_before(&self, before: DateTime<Utc>) -> MonitorResult<usize> {
        let mut removed = 0;
        removed += self.active.read().unwrap_or_else(|e| e.into_inner()).delete_before(before);
        for memtable in self.immutable.read().unwrap_or_else(|e| e.into_inner()).iter() {
            removed += memtable.delete_before(before);
        }

        let mut levels = self.levels.write().unwrap_or_else(|e| e.into_inner());
        for level in levels.iter_mut() {
            let mut kept = Vec::new();
            for table in level.drain(..) {
                if table.max_ts < before {
                    removed += table.entry_count;
                    table.delete_file();
                } else if table.min_ts >= before {
                    kept.push(table);
                } else {
                    let before_count = table.entry_count;
                    if let Some(rewritten) = table.rewrite_retaining_from(before)? {
                        removed += before_count - rewritten.entry_count;
                        kept.push(Arc::new(rewritten));
                    } else {
                        removed += before_count;
                    }
                }
            }
            *level = kept;
        }
        self.query_cache.invalidate_all();
        Ok(removed)
    }

    /// Flushes the active memtable, then copies every on-disk SSTable plus
    /// the WAL into `path`, giving a consistent point-in-time copy.
    pub fn create_snapshot(&self, path: &std::path::Path) -> MonitorResult<()> {
        self.seal_active();
        while self.flush_oldest_immutable()? {}
        std::fs::create_dir_all(path)
            .map_err(|e| MonitorError::StorageWriteFailed(format!("creating snapshot dir: {e}")))?;
        let levels = self.levels.read().unwrap_or_else(|e| e.into_inner());
        for level in levels.iter() {
            for table in level {
                let dest_dir = path.join(format!("L{}", table.level));
                std::fs::create_dir_all(&dest_dir)
                    .map_err(|e| MonitorError::StorageWriteFailed(format!("creating snapshot level dir: {e}")))?;
                std::fs::copy(&table.path, dest_dir.join(format!("{}.sst", table.id)))
                    .map_err(|e| MonitorError::StorageWriteFailed(format!("copying sstable: {e}")))?;
            }
        }
        std::fs::copy(self.wal.lock().unwrap_or_else(|e| e.into_inner()).path(), path.join("wal.log"))
            .map_err(|e| MonitorError::StorageWriteFailed(format!("copying wal: {e}")))?;
        Ok(())
    }

    pub fn memtable_count(&self) -> usize {
        1 + self.immutable.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn sstable_count(&self) -> usize {
        self.levels.read().unwrap_or_else(|e| e.into_inner()).iter().map(Vec::len).sum()
    }

    /// Starts the background flush/compaction worker. One worker handles
    /// both duties each wake, matching the spec's bound on concurrent
    /// background compactions by simply running them serially here.
    pub fn start(self: &Arc<Self>) -> MonitorResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(MonitorError::AlreadyStarted);
        }
        let this = self.clone();
        let running = self.running.clone();
        let wake = self.wake.clone();
        let wake_lock = self.wake_lock.clone();
        let interval = std::time::Duration::from_millis(200);

        let handle = std::thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                while this.flush_oldest_immutable().unwrap_or(false) {}
                while this.maybe_compact_level0().unwrap_or(false) {}
                let guard = wake_lock.lock().unwrap_or_else(|e| e.into_inner());
                let _ = wake.wait_timeout(guard, interval);
            }
        });
        *self.flush_worker.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        Ok(())
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.wake.notify_all();
        if let Some(handle) = self.flush_worker.lock().unwrap_or_else(|e| e.into_inner()).take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.compaction_worker.lock().unwrap_or_else(|e| e.into_inner()).take() {
            let _ = handle.join();
        }
        self.seal_active();
        let _ = self.wal.lock().unwrap_or_else(|e| e.into_inner()).flush_to_disk();
    }
}
