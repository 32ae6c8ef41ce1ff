//! Buffered sink: batches alerts and flushes them as a single synthetic
//! group to an inner sink, bounded by size or time.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::alert::{Alert, AlertGroup, Labels};
use crate::error::MonitorResult;
use crate::notifiers::Notifier;

struct State {
    buffer: Vec<Alert>,
    last_flush: DateTime<Utc>,
}

pub struct BufferedNotifier {
    name: String,
    inner: Box<dyn Notifier>,
    buffer_size: usize,
    flush_interval: Duration,
    state: Mutex<State>,
}

impl BufferedNotifier {
    pub fn new(
        name: impl Into<String>,
        inner: Box<dyn Notifier>,
        buffer_size: usize,
        flush_interval: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            inner,
            buffer_size,
            flush_interval,
            state: Mutex::new(State {
                buffer: Vec::new(),
                last_flush: now,
            }),
        }
    }

    fn push_and_maybe_flush(&self, alert: Alert, now: DateTime<Utc>) -> MonitorResult<()> {
        let should_flush = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.buffer.push(alert);
            state.buffer.len() >= self.buffer_size
                || now.signed_duration_since(state.last_flush)
                    >= chrono::Duration::from_std(self.flush_interval).unwrap_or(chrono::Duration::zero())
        };
        if should_flush {
            self.flush(now)
        } else {
            Ok(())
        }
    }

    /// Forces a drain, packaging the buffered alerts into a synthetic
    /// group named `buffered` and delegating to the inner sink.
    pub fn flush(&self, now: DateTime<Utc>) -> MonitorResult<()> {
        let drained = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            let drained = std::mem::take(&mut state.buffer);
            state.last_flush = now;
            drained
        };
        if drained.is_empty() {
            return Ok(());
        }
        let group = AlertGroup {
            group_key: "buffered".to_string(),
            common_labels: Labels::new(),
            alerts: drained,
            first_seen: now,
            updated_at: now,
            last_sent: None,
        };
        self.inner.notify_group(&group)
    }
}

impl Notifier for BufferedNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_ready(&self) -> bool {
        self.inner.is_ready()
    }

    fn notify(&self, alert: &Alert) -> MonitorResult<()> {
        self.push_and_maybe_flush(alert.clone(), Utc::now())
    }

    fn notify_group(&self, group: &AlertGroup) -> MonitorResult<()> {
        let now = Utc::now();
        for alert in &group.alerts {
            self.push_and_maybe_flush(alert.clone(), now)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{Annotations, Severity};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counting(Arc<AtomicUsize>);
    impl Notifier for Counting {
        fn name(&self) -> &str {
            "counting"
        }
        fn is_ready(&self) -> bool {
            true
        }
        fn notify(&self, _alert: &Alert) -> MonitorResult<()> {
            Ok(())
        }
        fn notify_group(&self, group: &AlertGroup) -> MonitorResult<()> {
            self.0.fetch_add(group.alerts.len(), Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn flush_triggers_once_buffer_size_is_reached() {
        let flushed = Arc::new(AtomicUsize::new(0));
        let now = Utc::now();
        let sink = BufferedNotifier::new(
            "buf",
            Box::new(Counting(flushed.clone())),
            2,
            Duration::from_secs(3600),
            now,
        );
        let alert = Alert::new(
            "x",
            "r",
            Labels::new(),
            Annotations::new(),
            Severity::Info,
            1.0,
            now,
        );
        sink.notify(&alert).unwrap();
        assert_eq!(flushed.load(Ordering::SeqCst), 0);
        sink.notify(&alert).unwrap();
        assert_eq!(flushed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn explicit_flush_drains_a_partial_buffer() {
        let flushed = Arc::new(AtomicUsize::new(0));
        let now = Utc::now();
        let sink = BufferedNotifier::new(
            "buf",
            Box::new(Counting(flushed.clone())),
            10,
            Duration::from_secs(3600),
            now,
        );
        let alert = Alert::new(
            "x",
            "r",
            Labels::new(),
            Annotations::new(),
            Severity::Info,
            1.0,
            now,
        );
        sink.notify(&alert).unwrap();
        sink.flush(now).unwrap();
        assert_eq!(flushed.load(Ordering::SeqCst), 1);
    }
}
