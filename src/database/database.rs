//! The metric database: routes writes to per-partition time-series
//! engines, maintains a metric index for query planning, batches writes
//! through a background worker, and sweeps retention policies.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::thread::JoinHandle;

use chrono::{DateTime, Utc};

use crate::alert::Labels;
use crate::cfg::{DatabaseConfig, RetentionPolicyConfig, StorageConfig};
use crate::database::index::MetricIndex;
use crate::database::partition::{partition_id_for, Partition};
use crate::database::retention;
use crate::error::{MonitorError, MonitorResult};
use crate::metrics::MetricRecord;

pub struct MetricDatabase {
    config: DatabaseConfig,
    base_dir: PathBuf,
    retention_policies: Vec<RetentionPolicyConfig>,
    /// Logical key (as produced by the partition strategy) -> the
    /// currently-writable physical partition for it.
    active: RwLock<HashMap<String, Arc<Partition>>>,
    /// Every physical partition ever created, including rolled-over ones,
    /// keyed by physical id. Queries consult this set, not just `active`.
    all_partitions: RwLock<HashMap<String, Arc<Partition>>>,
    generations: Mutex<HashMap<String, u64>>,
    metric_index: MetricIndex,
    write_buffer: Mutex<Vec<MetricRecord>>,
    running: Arc<std::sync::atomic::AtomicBool>,
    wake: Arc<Condvar>,
    wake_lock: Arc<Mutex<()>>,
    write_worker: Mutex<Option<JoinHandle<()>>>,
    retention_worker: Mutex<Option<JoinHandle<()>>>,
}

impl MetricDatabase {
    pub fn new(
        config: DatabaseConfig,
        base_dir: PathBuf,
        retention_policies: Vec<RetentionPolicyConfig>,
    ) -> MonitorResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            base_dir,
            retention_policies,
            active: RwLock::new(HashMap::new()),
            all_partitions: RwLock::new(HashMap::new()),
            generations: Mutex::new(HashMap::new()),
            metric_index: MetricIndex::new(),
            write_buffer: Mutex::new(Vec::new()),
            running: Arc::new(std::sync::atomic::AtomicBool::new(false)),
            wake: Arc::new(Condvar::new()),
            wake_lock: Arc::new(Mutex::new(())),
            write_worker: Mutex::new(None),
            retention_worker: Mutex::new(None),
        })
    }

    fn logical_key(&self, name: &str, tags: &Labels, ts: DateTime<Utc>) -> String {
        partition_id_for(
            self.config.partition_strategy,
            name,
            tags,
            ts,
            self.config.partition_time_window,
            self.config.max_partitions,
        )
    }

    fn get_or_create_active(&self, logical_key: &str) -> MonitorResult<Arc<Partition>> {
        if let Some(partition) = self.active.read().unwrap_or_else(|e| e.into_inner()).get(logical_key) {
            if !partition.is_readonly() {
                return Ok(partition.clone());
            }
        }
        let mut active = self.active.write().unwrap_or_else(|e| e.into_inner());
        if let Some(partition) = active.get(logical_key) {
            if !partition.is_readonly() {
                return Ok(partition.clone());
            }
        }
        if self.all_partitions.read().unwrap_or_else(|e| e.into_inner()).len() >= self.config.max_partitions {
            return Err(MonitorError::ResourceExhausted("max_partitions reached".to_string()));
        }
        let mut generations = self.generations.lock().unwrap_or_else(|e| e.into_inner());
        let generation = generations.entry(logical_key.to_string()).or_insert(0);
        *generation += 1;
        let physical_id = if *generation == 1 {
            logical_key.to_string()
        } else {
            format!("{logical_key}#{generation}")
        };
        drop(generations);

        let storage_config = StorageConfig {
            data_directory: self.base_dir.join("partitions").join(&physical_id).join("sstables"),
            wal_directory: self.base_dir.join("partitions").join(&physical_id).join("wal"),
            ..Default::default()
        };
        let partition = Partition::new(physical_id.clone(), storage_config)?;
        active.insert(logical_key.to_string(), partition.clone());
        self.all_partitions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(physical_id, partition.clone());
        Ok(partition)
    }

    /// Writes one sample, routing it to its partition by the configured
    /// strategy, rolling the partition over first if it has hit its size
    /// or age cap.
    pub fn write(&self, name: &str, value: f64, ts: DateTime<Utc>, tags: Labels) -> MonitorResult<()> {
        let logical_key = self.logical_key(name, &tags, ts);
        let partition = self.get_or_create_active(&logical_key)?;
        if partition.should_roll_over(self.config.partition_size_bytes as u64, self.rollover_age()) {
            partition.mark_readonly();
            return self.write(name, value, ts, tags);
        }
        partition.engine.write(name, value, ts, tags.clone())?;
        partition.record_write(approx_point_bytes(&tags));
        self.metric_index.record(name, &partition.id, &tags, ts);
        Ok(())
    }

    fn rollover_age(&self) -> std::time::Duration {
        self.config.partition_time_window * 24u32
    }

    /// Pushes a record into the write buffer; flushes immediately if the
    /// buffer has reached `write_batch_size`.
    pub fn push(&self, record: MetricRecord) -> MonitorResult<()> {
        let should_flush = {
            let mut buffer = self.write_buffer.lock().unwrap_or_else(|e| e.into_inner());
            buffer.push(record);
            buffer.len() >= self.config.write_batch_size
        };
        if should_flush {
            self.flush_buffer()?;
        }
        Ok(())
    }

    /// Drains the write buffer, splitting by partition before handing
    /// batches to the underlying engines. Returns the count written.
    pub fn flush_buffer(&self) -> MonitorResult<usize> {
        let batch: Vec<MetricRecord> = {
            let mut buffer = self.write_buffer.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *buffer)
        };
        let mut by_partition: HashMap<String, Vec<MetricRecord>> = HashMap::new();
        for record in batch {
            let Some(value) = record.value.as_f64() else { continue };
            let logical_key = self.logical_key(&record.name, &record.labels, record.timestamp);
            by_partition.entry(logical_key).or_default().push(MetricRecord {
                value: crate::metrics::SampleValue::Float(value),
                ..record
            });
        }
        let mut written = 0;
        for (logical_key, records) in by_partition {
            let partition = self.get_or_create_active(&logical_key)?;
            written += partition.engine.write_batch(&records)?;
            for record in &records {
                partition.record_write(approx_point_bytes(&record.labels));
                self.metric_index.record(&record.name, &partition.id, &record.labels, record.timestamp);
            }
        }
        Ok(written)
    }

    /// Queries every partition indexed under `name`, merging results by
    /// timestamp.
    pub fn query(
        &self,
        name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        tag_filter: &Labels,
    ) -> MonitorResult<Vec<(DateTime<Utc>, f64, Labels)>> {
        let partition_ids = self.metric_index.partitions_for(name);
        let all_partitions = self.all_partitions.read().unwrap_or_else(|e| e.into_inner());
        let mut merged = Vec::new();
        for id in partition_ids {
            if let Some(partition) = all_partitions.get(&id) {
                merged.extend(partition.engine.query(name, start, end, tag_filter)?);
            }
        }
        merged.sort_by_key(|(ts, _, _)| *ts);
        Ok(merged)
    }

    pub fn partition_count(&self) -> usize {
        self.all_partitions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Sweeps every partition and applies every retention policy whose
    /// matcher covers a metric indexed there.
    pub fn run_retention_sweep(&self) -> MonitorResult<usize> {
        let mut total_removed = 0;
        for name in self.metric_index.metric_names() {
            let Some(entry) = self.metric_index.entry(&name) else { continue };
            for policy in &self.retention_policies {
                if !policy.matches(&name, &Default::default()) {
                    continue;
                }
                let all_partitions = self.all_partitions.read().unwrap_or_else(|e| e.into_inner());
                for partition_id in &entry.partition_ids {
                    if let Some(partition) = all_partitions.get(partition_id) {
                        total_removed += retention::apply_retention(policy, partition, &name)?;
                    }
                }
            }
        }
        Ok(total_removed)
    }

    /// Starts the write-batching worker (flushes on `write_batch_timeout`)
    /// and the retention worker (sweeps every `retention_check_interval`).
    pub fn start(self: &Arc<Self>) -> MonitorResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(MonitorError::AlreadyStarted);
        }

        let write_this = self.clone();
        let write_running = self.running.clone();
        let write_wake = self.wake.clone();
        let write_wake_lock = self.wake_lock.clone();
        let write_timeout = self.config.write_batch_timeout;
        let write_handle = std::thread::spawn(move || {
            while write_running.load(Ordering::SeqCst) {
                let _ = write_this.flush_buffer();
                let guard = write_wake_lock.lock().unwrap_or_else(|e| e.into_inner());
                let _ = write_wake.wait_timeout(guard, write_timeout);
            }
        });
        *self.write_worker.lock().unwrap_or_else(|e| e.into_inner()) = Some(write_handle);

        let retention_this = self.clone();
        let retention_running = self.running.clone();
        let retention_wake = self.wake.clone();
        let retention_wake_lock = self.wake_lock.clone();
        let retention_interval = self.config.retention_check_interval;
        let retention_handle = std::thread::spawn(move || {
            while retention_running.load(Ordering::SeqCst) {
                let _ = retention_this.run_retention_sweep();
                let guard = retention_wake_lock.lock().unwrap_or_else(|e| e.into_inner());
                let _ = retention_wake.wait_timeout(guard, retention_interval);
            }
        });
        *self.retention_worker.lock().unwrap_or_else(|e| e.into_inner()) = Some(retention_handle);
        Ok(())
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.wake.notify_all();
        if let Some(handle) = self.write_worker.lock().unwrap_or_else(|e| e.into_inner()).take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.retention_worker.lock().unwrap_or_else(|e| e.into_inner()).take() {
            let _ = handle.join();
        }
        let _ = self.flush_buffer();
    }
}

fn approx_point_bytes(tags: &Labels) -> u64 {
    (16 + tags.iter().map(|(k, v)| k.len() + v.len()).sum::<usize>()) as u64
}
