//! File sink: appends timestamped notification blocks under a lock.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::alert::{Alert, AlertGroup};
use crate::error::{MonitorError, MonitorResult};
use crate::notifiers::{Formatter, Notifier};

pub struct FileNotifier {
    name: String,
    path: PathBuf,
    formatter: Formatter,
    lock: Mutex<()>,
}

impl FileNotifier {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, formatter: Formatter) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            formatter,
            lock: Mutex::new(()),
        }
    }

    fn append(&self, body: &str) -> MonitorResult<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| MonitorError::StorageWriteFailed(e.to_string()))?;
        writeln!(file, "--- {} ---\n{}", chrono::Utc::now().to_rfc3339(), body)
            .map_err(|e| MonitorError::StorageWriteFailed(e.to_string()))
    }
}

impl Notifier for FileNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn notify(&self, alert: &Alert) -> MonitorResult<()> {
        self.append(&self.formatter.format_alert(alert))
    }

    fn notify_group(&self, group: &AlertGroup) -> MonitorResult<()> {
        self.append(&self.formatter.format_group(group))
    }
}
