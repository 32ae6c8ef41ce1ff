//! Trigger algorithms: the decision functions that turn a metric sample
//! into a boolean "condition met" signal feeding the alert state machine.
//!
//! The source models triggers through virtual inheritance over a shared
//! base; here they are a closed sum type instead, since the complete set is
//! known up front and no external plugin mechanism is required.

mod absent;
mod anomaly;
mod composite;
mod delta;
mod range;
mod rate_of_change;
mod threshold;

use std::time::Instant;

pub use absent::AbsentTrigger;
pub use anomaly::AnomalyTrigger;
pub use composite::{CompositeOp, CompositeTrigger};
pub use delta::{DeltaMode, DeltaTrigger};
pub use range::RangeTrigger;
pub use rate_of_change::{RateDirection, RateOfChangeTrigger};
pub use threshold::{ThresholdOperator, ThresholdTrigger, DEFAULT_EPSILON};

/// A closed set of trigger kinds, each evaluated against a single `f64`
/// sample plus the caller's monotonic `now`. `RateOfChange` and `Absent`
/// need that `now` for their sliding windows; the others ignore it. Callers
/// get `now` from a [`crate::clock::Clock`] rather than calling
/// [`Instant::now`] directly, so evaluation is deterministic under a
/// [`crate::clock::FakeClock`] in tests.
pub enum Trigger {
    Threshold(ThresholdTrigger),
    Range(RangeTrigger),
    RateOfChange(RateOfChangeTrigger),
    Anomaly(AnomalyTrigger),
    Composite(CompositeTrigger),
    Delta(DeltaTrigger),
    Absent(AbsentTrigger),
}

impl Trigger {
    pub fn evaluate(&self, value: f64, now: Instant) -> bool {
        match self {
            Trigger::Threshold(t) => t.evaluate(value),
            Trigger::Range(t) => t.evaluate(value),
            Trigger::RateOfChange(t) => t.evaluate(value, now),
            Trigger::Anomaly(t) => t.evaluate(value),
            Trigger::Composite(t) => t.evaluate(value, now),
            Trigger::Delta(t) => t.evaluate(value),
            Trigger::Absent(t) => t.evaluate(now),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Trigger::Threshold(t) => t.type_name(),
            Trigger::Range(t) => t.type_name(),
            Trigger::RateOfChange(t) => t.type_name(),
            Trigger::Anomaly(t) => t.type_name(),
            Trigger::Composite(t) => t.type_name(),
            Trigger::Delta(t) => t.type_name(),
            Trigger::Absent(t) => t.type_name(),
        }
    }

    pub fn description(&self) -> String {
        match self {
            Trigger::Threshold(t) => t.description(),
            Trigger::Range(t) => t.description(),
            Trigger::RateOfChange(t) => t.description(),
            Trigger::Anomaly(t) => t.description(),
            Trigger::Composite(t) => t.description(),
            Trigger::Delta(t) => t.description(),
            Trigger::Absent(t) => t.description(),
        }
    }

    pub fn reset(&self) {
        match self {
            Trigger::RateOfChange(t) => t.reset(),
            Trigger::Anomaly(t) => t.reset(),
            Trigger::Delta(t) => t.reset(),
            Trigger::Absent(t) => t.reset(),
            Trigger::Threshold(_) | Trigger::Range(_) | Trigger::Composite(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_enum_dispatches_to_the_right_variant() {
        let t = Trigger::Threshold(ThresholdTrigger::new(ThresholdOperator::GreaterThan, 80.0));
        assert_eq!(t.type_name(), "threshold");
        assert!(t.evaluate(90.0, Instant::now()));
        assert!(!t.evaluate(10.0, Instant::now()));
    }
}
