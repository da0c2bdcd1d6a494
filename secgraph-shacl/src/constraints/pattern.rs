//! String pattern constraint validator

use super::datatype::display_value;
use super::{Constraint, ConstraintViolation};
use regex::Regex;
use secgraph_ir::Term;

/// Validate a pattern constraint: every literal value's lexical form must
/// match the regex. Non-literal values violate (a pattern constrains
/// strings, and an IRI where a string was expected is a data error).
pub fn validate_pattern(values: &[&Term], re: &Regex) -> Vec<ConstraintViolation> {
    let mut out = Vec::new();
    for v in values {
        let matched = match v.as_literal() {
            Some((value, _, _)) => re.is_match(&value.lexical()),
            None => false,
        };
        if !matched {
            out.push(ConstraintViolation {
                constraint: Constraint::Pattern(re.clone()),
                value: Some(display_value(v)),
                message: format!("Value does not match pattern \"{}\"", re.as_str()),
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_match() {
        let re = Regex::new("^CVE-\\d{4}-\\d{4,}$").unwrap();
        let good = Term::string("CVE-2024-12345");
        let bad = Term::string("CVE-nope");
        assert!(validate_pattern(&[&good], &re).is_empty());
        assert_eq!(validate_pattern(&[&bad], &re).len(), 1);
    }

    #[test]
    fn test_pattern_rejects_non_literal() {
        let re = Regex::new(".*").unwrap();
        let iri = Term::iri("http://example.org/x");
        assert_eq!(validate_pattern(&[&iri], &re).len(), 1);
    }

    #[test]
    fn test_pattern_on_numeric_lexical() {
        let re = Regex::new("^\\d+$").unwrap();
        let n = Term::integer(42);
        assert!(validate_pattern(&[&n], &re).is_empty());
    }
}
