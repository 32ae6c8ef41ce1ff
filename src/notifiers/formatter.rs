//! Maps an alert or alert group to a serialized notification payload, and
//! resolves `${var}` templates against an alert's fields.

use serde::Serialize;

use crate::alert::{Alert, AlertGroup};
use crate::error::{MonitorError, MonitorResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    Json,
    Text,
}

#[derive(Serialize)]
struct AlertPayload<'a> {
    name: &'a str,
    state: String,
    severity: String,
    value: f64,
    summary: &'a str,
    description: &'a str,
    fingerprint: String,
    labels: &'a crate::alert::Labels,
}

#[derive(Serialize)]
struct GroupPayload<'a> {
    group_key: &'a str,
    severity: Option<String>,
    alert_count: usize,
    alerts: Vec<AlertPayload<'a>>,
}

impl<'a> AlertPayload<'a> {
    fn from_alert(alert: &'a Alert) -> Self {
        Self {
            name: &alert.name,
            state: alert.state.to_string(),
            severity: alert.severity.to_string(),
            value: alert.value,
            summary: alert.annotations.get("summary").map(String::as_str).unwrap_or(""),
            description: alert
                .annotations
                .get("description")
                .map(String::as_str)
                .unwrap_or(""),
            fingerprint: alert.fingerprint(),
            labels: &alert.labels,
        }
    }
}

pub struct Formatter {
    pub format: PayloadFormat,
}

impl Formatter {
    pub fn new(format: PayloadFormat) -> Self {
        Self { format }
    }

    pub fn format_alert(&self, alert: &Alert) -> String {
        match self.format {
            PayloadFormat::Json => {
                let payload = AlertPayload::from_alert(alert);
                serde_json::to_string(&payload).unwrap_or_else(|_| "{}".to_string())
            }
            PayloadFormat::Text => format!(
                "[{}] {} ({})\nSummary: {}\nValue: {}\nFingerprint: {}",
                alert.state,
                alert.name,
                alert.severity,
                alert.annotations.get("summary").map(String::as_str).unwrap_or(""),
                alert.value,
                alert.fingerprint(),
            ),
        }
    }

    pub fn format_group(&self, group: &AlertGroup) -> String {
        match self.format {
            PayloadFormat::Json => {
                let payload = GroupPayload {
                    group_key: &group.group_key,
                    severity: group.max_severity().map(|s| s.to_string()),
                    alert_count: group.alerts.len(),
                    alerts: group.alerts.iter().map(AlertPayload::from_alert).collect(),
                };
                serde_json::to_string(&payload).unwrap_or_else(|_| "{}".to_string())
            }
            PayloadFormat::Text => format!(
                "group {} ({} alerts)",
                group.group_key,
                group.alerts.len()
            ),
        }
    }
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new(PayloadFormat::Json)
    }
}

/// Resolves a `${var}` template against an alert. Built-ins: `name`,
/// `state`, `severity`, `value`, `fingerprint`, `rule_name`, `group_key`,
/// `labels.<key>`, `annotations.summary`, `annotations.description`,
/// `annotations.runbook_url`, `annotations.<key>`. Unknown variables pass
/// through literally (the `${...}` is left in place); an unclosed `${`
/// is a validation error.
pub fn render_template(template: &str, alert: &Alert) -> MonitorResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            return Err(MonitorError::ValidationFailed(format!(
                "unclosed template variable in: {template}"
            )));
        };
        let var = &after[..end];
        match resolve_var(var, alert) {
            Some(value) => out.push_str(&value),
            None => {
                out.push_str("${");
                out.push_str(var);
                out.push('}');
            }
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

fn resolve_var(var: &str, alert: &Alert) -> Option<String> {
    if let Some(key) = var.strip_prefix("labels.") {
        return alert.labels.get(key).cloned();
    }
    if let Some(key) = var.strip_prefix("annotations.") {
        return alert.annotations.get(key).cloned();
    }
    match var {
        "name" => Some(alert.name.clone()),
        "state" => Some(alert.state.to_string()),
        "severity" => Some(alert.severity.to_string()),
        "value" => Some(alert.value.to_string()),
        "fingerprint" => Some(alert.fingerprint()),
        "rule_name" => Some(alert.rule_name.clone()),
        "group_key" => Some(alert.group_key.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{Annotations, Labels, Severity};
    use chrono::Utc;

    #[test]
    fn json_format_roundtrips_through_serde_json() {
        let alert = Alert::new(
            "x",
            "r",
            Labels::new(),
            Annotations::new(),
            Severity::Warning,
            1.0,
            Utc::now(),
        );
        let f = Formatter::new(PayloadFormat::Json);
        let s = f.format_alert(&alert);
        assert!(serde_json::from_str::<serde_json::Value>(&s).is_ok());
    }

    #[test]
    fn text_format_is_human_readable() {
        let alert = Alert::new(
            "x",
            "r",
            Labels::new(),
            Annotations::new(),
            Severity::Critical,
            99.5,
            Utc::now(),
        );
        let f = Formatter::new(PayloadFormat::Text);
        assert!(f.format_alert(&alert).contains("critical"));
    }

    fn template_alert() -> Alert {
        let labels: Labels = [("team".to_string(), "infra".to_string())].into_iter().collect();
        let annotations: Annotations = [("summary".to_string(), "cpu is hot".to_string())]
            .into_iter()
            .collect();
        let mut alert = Alert::new(
            "high_cpu",
            "high_cpu",
            labels,
            annotations,
            Severity::Critical,
            91.5,
            Utc::now(),
        );
        alert.group_key = "infra".to_string();
        alert
    }

    #[test]
    fn renders_builtin_and_label_and_annotation_vars() {
        let alert = template_alert();
        let out = render_template(
            "${name} is ${state} on team ${labels.team}: ${annotations.summary}",
            &alert,
        )
        .unwrap();
        assert_eq!(out, "high_cpu is inactive on team infra: cpu is hot");
    }

    #[test]
    fn unknown_variable_passes_through_literally() {
        let alert = template_alert();
        let out = render_template("${annotations.runbook_url} missing", &alert).unwrap();
        assert_eq!(out, "${annotations.runbook_url} missing");
    }

    #[test]
    fn unclosed_variable_is_a_validation_error() {
        let alert = template_alert();
        assert!(render_template("${name is broken", &alert).is_err());
    }
}
