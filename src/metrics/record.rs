//! A compact, self-contained snapshot of a single metric observation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::alert::Labels;

/// Discriminates the primitive that produced a [`MetricRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
    Summary,
    Timer,
}

/// The observed value carried by a record. Only the `Float` arm feeds
/// trigger evaluation; `Int` and `Text` are carried through storage and
/// queries untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SampleValue {
    Float(f64),
    Int(i64),
    Text(String),
}

impl SampleValue {
    /// The numeric value triggers evaluate against, if any.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SampleValue::Float(v) => Some(*v),
            SampleValue::Int(v) => Some(*v as f64),
            SampleValue::Text(_) => None,
        }
    }
}

/// One observation of a named metric at a point in time, tagged with
/// labels. This is the unit that flows from collection into the
/// time-series engine and into rule evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricRecord {
    pub name: String,
    pub kind: MetricKind,
    pub value: SampleValue,
    pub labels: Labels,
    pub timestamp: DateTime<Utc>,
}

impl MetricRecord {
    pub fn new(
        name: impl Into<String>,
        kind: MetricKind,
        value: SampleValue,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            value,
            labels: BTreeMap::new(),
            timestamp,
        }
    }

    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }
}
