//! A generic connection pool sharing a fixed set of handles across
//! callers. Checkout is RAII-style: the returned [`Lease`] puts its handle
//! back on drop.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct PoolMetrics {
    pub total: AtomicUsize,
    pub active: AtomicUsize,
    pub idle: AtomicUsize,
    /// Cumulative microseconds every `acquire` call has spent waiting for
    /// a handle, for computing an average wait time.
    pub total_wait_micros: AtomicU64,
    pub acquisitions: AtomicU64,
}

struct Inner<T> {
    idle: Mutex<VecDeque<Arc<T>>>,
    wake: Condvar,
    metrics: PoolMetrics,
}

pub struct Pool<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T> Pool<T> {
    pub fn new(handles: Vec<Arc<T>>) -> Self {
        let total = handles.len();
        let inner = Arc::new(Inner {
            idle: Mutex::new(handles.into()),
            wake: Condvar::new(),
            metrics: PoolMetrics::default(),
        });
        inner.metrics.total.store(total, Ordering::SeqCst);
        inner.metrics.idle.store(total, Ordering::SeqCst);
        Self { inner }
    }

    /// Blocks, up to `timeout`, for an idle handle. Returns `None` on
    /// timeout.
    pub fn acquire(&self, timeout: Duration) -> Option<Lease<T>> {
        let started = Instant::now();
        let mut idle = self.inner.idle.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if let Some(handle) = idle.pop_front() {
                let waited = started.elapsed();
                self.inner.metrics.idle.fetch_sub(1, Ordering::SeqCst);
                self.inner.metrics.active.fetch_add(1, Ordering::SeqCst);
                self.inner.metrics.acquisitions.fetch_add(1, Ordering::SeqCst);
                self.inner
                    .metrics
                    .total_wait_micros
                    .fetch_add(waited.as_micros() as u64, Ordering::SeqCst);
                return Some(Lease {
                    handle: Some(handle),
                    pool: self.inner.clone(),
                });
            }
            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return None;
            }
            let (guard, _) = self
                .inner
                .wake
                .wait_timeout(idle, timeout - elapsed)
                .unwrap_or_else(|e| e.into_inner());
            idle = guard;
        }
    }

    pub fn metrics(&self) -> &PoolMetrics {
        &self.inner.metrics
    }
}

/// An on-loan handle. Returned to the pool's idle queue when dropped.
pub struct Lease<T> {
    handle: Option<Arc<T>>,
    pool: Arc<Inner<T>>,
}

impl<T> std::ops::Deref for Lease<T> {
    type Target = T;
    fn deref(&self) -> &T {
        self.handle.as_ref().expect("handle taken only on drop")
    }
}

impl<T> Drop for Lease<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.pool.idle.lock().unwrap_or_else(|e| e.into_inner()).push_back(handle);
            self.pool.metrics.active.fetch_sub(1, Ordering::SeqCst);
            self.pool.metrics.idle.fetch_add(1, Ordering::SeqCst);
            self.pool.wake.notify_one();
        }
    }
}
