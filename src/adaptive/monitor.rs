//! Adaptation worker: periodically pulls a system snapshot and calls
//! `adapt` on every registered collector.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::adaptive::AdaptiveCollector;
use crate::error::{MonitorError, MonitorResult};
use crate::provider::PlatformMetricsProvider;

/// Owns a named set of [`AdaptiveCollector`]s and runs a single background
/// thread that feeds each one a fresh `(cpu%, memory%)` sample at
/// `adaptation_interval`. Sleeps in slices of that interval so shutdown
/// latency stays bounded.
pub struct AdaptiveMonitor {
    collectors: Arc<Mutex<HashMap<String, Arc<AdaptiveCollector>>>>,
    provider: Arc<dyn PlatformMetricsProvider>,
    adaptation_interval: Duration,
    running: Arc<AtomicBool>,
    wake: Arc<Condvar>,
    wake_lock: Arc<Mutex<()>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AdaptiveMonitor {
    pub fn new(provider: Arc<dyn PlatformMetricsProvider>, adaptation_interval: Duration) -> Self {
        Self {
            collectors: Arc::new(Mutex::new(HashMap::new())),
            provider,
            adaptation_interval,
            running: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Condvar::new()),
            wake_lock: Arc::new(Mutex::new(())),
            worker: Mutex::new(None),
        }
    }

    pub fn register(&self, name: impl Into<String>, collector: Arc<AdaptiveCollector>) {
        self.collectors
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.into(), collector);
    }

    pub fn start(&self) -> MonitorResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(MonitorError::AlreadyStarted);
        }
        let collectors = self.collectors.clone();
        let provider = self.provider.clone();
        let interval = self.adaptation_interval;
        let running = self.running.clone();
        let wake = self.wake.clone();
        let wake_lock = self.wake_lock.clone();

        let handle = std::thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                let snapshot = provider.snapshot();
                let cpu = snapshot.cpu_usage_percent.unwrap_or(0.0);
                let mem = snapshot.memory_usage_percent.unwrap_or(0.0);
                for collector in collectors.lock().unwrap_or_else(|e| e.into_inner()).values() {
                    collector.adapt(cpu, mem);
                }

                let guard = wake_lock.lock().unwrap_or_else(|e| e.into_inner());
                let _ = wake.wait_timeout(guard, interval);
            }
        });
        *self.worker.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        Ok(())
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.wake.notify_all();
        if let Some(handle) = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take() {
            let _ = handle.join();
        }
    }
}
