//! Threshold trigger: compares a value against a fixed bound.

use serde::{Deserialize, Serialize};

/// Default epsilon used for equality and for widening `>=`/`<=` comparisons.
pub const DEFAULT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThresholdOperator {
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
    Equal,
    NotEqual,
}

impl std::fmt::Display for ThresholdOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ThresholdOperator::GreaterThan => ">",
            ThresholdOperator::GreaterOrEqual => ">=",
            ThresholdOperator::LessThan => "<",
            ThresholdOperator::LessOrEqual => "<=",
            ThresholdOperator::Equal => "==",
            ThresholdOperator::NotEqual => "!=",
        };
        write!(f, "{s}")
    }
}

/// Stateless value-vs-threshold comparison. `>=`/`<=` widen the comparison
/// by `epsilon` so values that are within floating-point noise of the bound
/// still match; `>`/`<` are strict and ignore epsilon; `==`/`!=` use epsilon
/// directly as the tolerance.
#[derive(Debug, Clone)]
pub struct ThresholdTrigger {
    pub operator: ThresholdOperator,
    pub threshold: f64,
    pub epsilon: f64,
}

impl ThresholdTrigger {
    pub fn new(operator: ThresholdOperator, threshold: f64) -> Self {
        Self {
            operator,
            threshold,
            epsilon: DEFAULT_EPSILON,
        }
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn evaluate(&self, value: f64) -> bool {
        match self.operator {
            ThresholdOperator::GreaterThan => value > self.threshold,
            ThresholdOperator::GreaterOrEqual => value > self.threshold - self.epsilon,
            ThresholdOperator::LessThan => value < self.threshold,
            ThresholdOperator::LessOrEqual => value < self.threshold + self.epsilon,
            ThresholdOperator::Equal => (value - self.threshold).abs() <= self.epsilon,
            ThresholdOperator::NotEqual => (value - self.threshold).abs() > self.epsilon,
        }
    }

    pub fn type_name(&self) -> &'static str {
        "threshold"
    }

    pub fn description(&self) -> String {
        format!("value {} {}", self.operator, self.threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_uses_epsilon_tolerance() {
        let t = ThresholdTrigger::new(ThresholdOperator::Equal, 80.0);
        assert!(t.evaluate(80.0));
        assert!(!t.evaluate(80.0 + 10.0 * DEFAULT_EPSILON));
    }

    #[test]
    fn strict_greater_than_ignores_epsilon() {
        let t = ThresholdTrigger::new(ThresholdOperator::GreaterThan, 80.0);
        assert!(!t.evaluate(80.0));
        assert!(t.evaluate(80.0 + 1.0));
    }

    #[test]
    fn greater_or_equal_widens_by_epsilon() {
        let t = ThresholdTrigger::new(ThresholdOperator::GreaterOrEqual, 80.0);
        assert!(t.evaluate(80.0));
        assert!(t.evaluate(80.0 - DEFAULT_EPSILON / 2.0));
        assert!(!t.evaluate(79.0));
    }

    #[test]
    fn basic_above_scenario() {
        let t = ThresholdTrigger::new(ThresholdOperator::GreaterThan, 80.0);
        let seq = [50.0, 85.0, 90.0, 90.0, 40.0];
        let fired: Vec<bool> = seq.iter().map(|v| t.evaluate(*v)).collect();
        assert_eq!(fired, vec![false, true, true, true, false]);
    }
}
