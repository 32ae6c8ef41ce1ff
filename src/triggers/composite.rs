//! Composite trigger: boolean combination of child triggers.

use std::time::Instant;

use super::Trigger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeOp {
    And,
    Or,
    Xor,
    Not,
}

pub struct CompositeTrigger {
    pub op: CompositeOp,
    pub children: Vec<Trigger>,
}

impl CompositeTrigger {
    pub fn new(op: CompositeOp, children: Vec<Trigger>) -> Self {
        Self { op, children }
    }

    /// Applies the same value to every child.
    pub fn evaluate(&self, value: f64, now: Instant) -> bool {
        let values = vec![value; self.children.len()];
        self.evaluate_multi(&values, now)
    }

    /// Applies `values[i]` to child `i`; the last provided value is repeated
    /// for any remaining children if fewer values than children are given.
    pub fn evaluate_multi(&self, values: &[f64], now: Instant) -> bool {
        if self.children.is_empty() {
            return false;
        }
        let last = values.last().copied().unwrap_or(0.0);
        let results: Vec<bool> = self
            .children
            .iter()
            .enumerate()
            .map(|(i, child)| child.evaluate(*values.get(i).unwrap_or(&last), now))
            .collect();

        match self.op {
            CompositeOp::And => results.iter().all(|&r| r),
            CompositeOp::Or => results.iter().any(|&r| r),
            CompositeOp::Xor => results.iter().filter(|&&r| r).count() == 1,
            CompositeOp::Not => !results[0],
        }
    }

    pub fn type_name(&self) -> &'static str {
        "composite"
    }

    pub fn description(&self) -> String {
        format!("{:?} of {} children", self.op, self.children.len())
    }
}
