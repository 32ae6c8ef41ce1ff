//! Multi sink: fans out to every ready child, collecting failures.

use crate::alert::{Alert, AlertGroup};
use crate::error::{MonitorError, MonitorResult};
use crate::notifiers::Notifier;

pub struct MultiNotifier {
    name: String,
    children: Vec<Box<dyn Notifier>>,
}

impl MultiNotifier {
    pub fn new(name: impl Into<String>, children: Vec<Box<dyn Notifier>>) -> Self {
        Self {
            name: name.into(),
            children,
        }
    }
}

impl Notifier for MultiNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_ready(&self) -> bool {
        self.children.iter().any(|c| c.is_ready())
    }

    fn notify(&self, alert: &Alert) -> MonitorResult<()> {
        let mut failed = Vec::new();
        for child in &self.children {
            if !child.is_ready() {
                continue;
            }
            if let Err(e) = child.notify(alert) {
                failed.push(format!("{}: {e}", child.name()));
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(MonitorError::OperationFailed(failed.join("; ")))
        }
    }

    fn notify_group(&self, group: &AlertGroup) -> MonitorResult<()> {
        let mut failed = Vec::new();
        for child in &self.children {
            if !child.is_ready() {
                continue;
            }
            if let Err(e) = child.notify_group(group) {
                failed.push(format!("{}: {e}", child.name()));
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(MonitorError::OperationFailed(failed.join("; ")))
        }
    }
}
