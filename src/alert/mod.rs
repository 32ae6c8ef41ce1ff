//! Alert data model: labels, severity, state machine, groups, silences,
//! inhibition rules.

mod types;

pub use types::{
    fingerprint, Alert, AlertGroup, AlertState, Annotations, InhibitionRule, Labels, Severity,
    Silence,
};
