//! Log sink: writes a formatted summary through `tracing`.

use crate::alert::{Alert, AlertGroup};
use crate::error::MonitorResult;
use crate::notifiers::{Formatter, Notifier};

pub struct LogNotifier {
    name: String,
    formatter: Formatter,
}

impl LogNotifier {
    pub fn new(name: impl Into<String>, formatter: Formatter) -> Self {
        Self {
            name: name.into(),
            formatter,
        }
    }
}

impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn notify(&self, alert: &Alert) -> MonitorResult<()> {
        tracing::info!(sink = %self.name, "{}", self.formatter.format_alert(alert));
        Ok(())
    }

    fn notify_group(&self, group: &AlertGroup) -> MonitorResult<()> {
        tracing::info!(sink = %self.name, "{}", self.formatter.format_group(group));
        Ok(())
    }
}
