//! Notification sinks: the pluggable fan-out surface for firing and
//! resolved alerts.

mod buffered;
mod callback;
mod file;
mod formatter;
mod log;
mod multi;
mod routing;
mod webhook;

use crate::alert::{Alert, AlertGroup};
use crate::error::MonitorResult;

pub use buffered::BufferedNotifier;
pub use callback::CallbackNotifier;
pub use file::FileNotifier;
pub use formatter::{render_template, Formatter, PayloadFormat};
pub use log::LogNotifier;
pub use multi::MultiNotifier;
pub use routing::{Route, RoutingNotifier};
pub use webhook::{HttpSender, WebhookConfig, WebhookNotifier};

/// Minimal capability interface every notification sink implements. A
/// closed trait rather than a sum type, since sinks are the one part of
/// this design meant to be externally extensible.
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;
    fn is_ready(&self) -> bool;
    fn notify(&self, alert: &Alert) -> MonitorResult<()>;
    fn notify_group(&self, group: &AlertGroup) -> MonitorResult<()>;
}
