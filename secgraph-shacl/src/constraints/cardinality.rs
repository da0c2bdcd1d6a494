//! Cardinality constraint validators (minCount, maxCount)

use super::{Constraint, ConstraintViolation};
use secgraph_ir::Term;

/// Validate a minCount constraint.
pub fn validate_min_count(values: &[&Term], min: usize) -> Option<ConstraintViolation> {
    if values.len() < min {
        Some(ConstraintViolation {
            constraint: Constraint::MinCount(min),
            value: None,
            message: format!(
                "Expected at least {} value(s) but found {}",
                min,
                values.len()
            ),
        })
    } else {
        None
    }
}

/// Validate a maxCount constraint.
pub fn validate_max_count(values: &[&Term], max: usize) -> Option<ConstraintViolation> {
    if values.len() > max {
        Some(ConstraintViolation {
            constraint: Constraint::MaxCount(max),
            value: None,
            message: format!(
                "Expected at most {} value(s) but found {}",
                max,
                values.len()
            ),
        })
    } else {
        None
    }
}
