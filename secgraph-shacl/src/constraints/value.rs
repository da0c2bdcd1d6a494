//! Value set constraint validator

use super::datatype::display_value;
use super::{Constraint, ConstraintViolation};
use secgraph_ir::Term;

/// Validate an `in` constraint: every value must appear in the allowed set.
///
/// IRIs compare by IRI text, literals by lexical form — the contract file
/// lists both the same way.
pub fn validate_in(values: &[&Term], allowed: &[String]) -> Vec<ConstraintViolation> {
    let mut out = Vec::new();
    for v in values {
        let text = display_value(v);
        if !allowed.iter().any(|a| a == &text) {
            out.push(ConstraintViolation {
                constraint: Constraint::In(allowed.to_vec()),
                value: Some(text),
                message: format!("Value is not one of the {} allowed values", allowed.len()),
            });
        }
    }
    out
}
