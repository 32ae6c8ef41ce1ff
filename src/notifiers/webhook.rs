//! Webhook sink: formats a payload and delegates the actual transport to an
//! injected sender closure, so this crate never depends on an HTTP client.

use std::time::Duration;

use crate::alert::{Alert, AlertGroup};
use crate::error::{MonitorError, MonitorResult};
use crate::notifiers::{Formatter, Notifier};

/// `(url, method, headers, body) -> Result<(), message>`
pub type HttpSender =
    Box<dyn Fn(&str, &str, &[(String, String)], &str) -> Result<(), String> + Send + Sync>;

pub struct WebhookConfig {
    pub url: String,
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl WebhookConfig {
    pub fn validate(&self) -> MonitorResult<()> {
        if self.url.trim().is_empty() {
            return Err(MonitorError::invalid_configuration("webhook url must not be empty"));
        }
        Ok(())
    }
}

pub struct WebhookNotifier {
    name: String,
    config: WebhookConfig,
    formatter: Formatter,
    sender: Option<HttpSender>,
}

impl WebhookNotifier {
    pub fn new(name: impl Into<String>, config: WebhookConfig, formatter: Formatter) -> Self {
        Self {
            name: name.into(),
            config,
            formatter,
            sender: None,
        }
    }

    pub fn with_sender(mut self, sender: HttpSender) -> Self {
        self.sender = Some(sender);
        self
    }

    fn send(&self, body: String) -> MonitorResult<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| MonitorError::invalid_state("webhook sender not configured"))?;

        let mut last_err = String::new();
        for attempt in 0..=self.config.max_retries {
            match sender(&self.config.url, &self.config.method, &self.config.headers, &body) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    last_err = e;
                    if attempt < self.config.max_retries {
                        std::thread::sleep(self.config.retry_delay);
                    }
                }
            }
        }
        Err(MonitorError::RetryAttemptsExhausted {
            attempts: self.config.max_retries + 1,
            message: last_err,
        })
    }
}

impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_ready(&self) -> bool {
        self.config.validate().is_ok() && self.sender.is_some()
    }

    fn notify(&self, alert: &Alert) -> MonitorResult<()> {
        self.send(self.formatter.format_alert(alert))
    }

    fn notify_group(&self, group: &AlertGroup) -> MonitorResult<()> {
        self.send(self.formatter.format_group(group))
    }
}
