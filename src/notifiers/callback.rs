//! Callback sink: invokes injected closures for single and group
//! notifications.

use crate::alert::{Alert, AlertGroup};
use crate::error::MonitorResult;
use crate::notifiers::Notifier;

type AlertCallback = Box<dyn Fn(&Alert) -> MonitorResult<()> + Send + Sync>;
type GroupCallback = Box<dyn Fn(&AlertGroup) -> MonitorResult<()> + Send + Sync>;

pub struct CallbackNotifier {
    name: String,
    on_alert: AlertCallback,
    on_group: Option<GroupCallback>,
}

impl CallbackNotifier {
    pub fn new(name: impl Into<String>, on_alert: AlertCallback) -> Self {
        Self {
            name: name.into(),
            on_alert,
            on_group: None,
        }
    }

    pub fn with_group_callback(mut self, on_group: GroupCallback) -> Self {
        self.on_group = Some(on_group);
        self
    }
}

impl Notifier for CallbackNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn notify(&self, alert: &Alert) -> MonitorResult<()> {
        (self.on_alert)(alert)
    }

    /// Without an explicit group callback, falls back to iterating the
    /// single-alert callback and short-circuits on the first error.
    fn notify_group(&self, group: &AlertGroup) -> MonitorResult<()> {
        if let Some(on_group) = &self.on_group {
            return on_group(group);
        }
        for alert in &group.alerts {
            (self.on_alert)(alert)?;
        }
        Ok(())
    }
}
