//! Value type constraint validators (datatype, nodeKind)

use super::{Constraint, ConstraintViolation, NodeKind};
use secgraph_ir::Term;

/// Validate a datatype constraint: every value must be a literal carrying
/// the given datatype IRI.
pub fn validate_datatype(values: &[&Term], dt_iri: &str) -> Vec<ConstraintViolation> {
    let mut out = Vec::new();
    for v in values {
        let ok = match v.as_literal() {
            Some((_, dt, _)) => dt.as_iri() == dt_iri,
            None => false,
        };
        if !ok {
            out.push(ConstraintViolation {
                constraint: Constraint::Datatype(dt_iri.to_string()),
                value: Some(display_value(v)),
                message: format!("Value does not have datatype {}", dt_iri),
            });
        }
    }
    out
}

/// Validate a nodeKind constraint.
pub fn validate_node_kind(values: &[&Term], kind: NodeKind) -> Vec<ConstraintViolation> {
    let mut out = Vec::new();
    for v in values {
        let ok = match kind {
            NodeKind::Iri => v.is_iri(),
            NodeKind::Blank => v.is_blank(),
            NodeKind::Literal => v.is_literal(),
        };
        if !ok {
            out.push(ConstraintViolation {
                constraint: Constraint::NodeKind(kind),
                value: Some(display_value(v)),
                message: format!("Value is not of node kind {:?}", kind),
            });
        }
    }
    out
}

/// Compact value rendering for violation messages.
pub(crate) fn display_value(term: &Term) -> String {
    match term {
        Term::Iri(iri) => iri.to_string(),
        Term::Blank(label) => format!("_:{}", label),
        Term::Literal { value, .. } => value.lexical(),
    }
}
