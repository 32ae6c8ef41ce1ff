//! Rule registration: the named bindings between a metric, a trigger, and
//! the timings that drive the alert state machine.

mod rule;

pub use rule::Rule;
