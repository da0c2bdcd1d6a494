//! The atomic unit of graph data: one (subject, predicate, object) statement.

use crate::Term;
use serde::{Deserialize, Serialize};

/// A single RDF statement.
///
/// # Invariants
///
/// - `s` is an IRI or blank node (never a literal)
/// - `p` is always an IRI
/// - `o` may be any term
///
/// Constructed by the reader; immutable afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    /// Subject
    pub s: Term,
    /// Predicate
    pub p: Term,
    /// Object
    pub o: Term,
}

impl Triple {
    /// Create a new triple.
    ///
    /// Debug-asserts the positional invariants; the reader is responsible
    /// for never producing a literal subject or non-IRI predicate.
    pub fn new(s: Term, p: Term, o: Term) -> Self {
        debug_assert!(s.is_reference(), "subject must be an IRI or blank node");
        debug_assert!(p.is_iri(), "predicate must be an IRI");
        Triple { s, p, o }
    }

    /// The grouping key used for subject-aligned partitioning.
    ///
    /// IRIs key by their IRI text, blank nodes by `_:label` — distinct from
    /// any IRI since IRIs cannot start with `_:`.
    pub fn subject_key(&self) -> String {
        match &self.s {
            Term::Iri(iri) => iri.to_string(),
            Term::Blank(label) => format!("_:{}", label),
            Term::Literal { .. } => unreachable!("literal subject"),
        }
    }

    /// The predicate IRI.
    pub fn predicate_iri(&self) -> &str {
        self.p.as_iri().expect("predicate is always an IRI")
    }
}

impl std::fmt::Display for Triple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {} .", self.s, self.p, self.o)
    }
}
