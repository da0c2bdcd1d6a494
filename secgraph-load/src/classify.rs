//! Pass classification.
//!
//! Every triple belongs to exactly one of two strictly ordered bulk-write
//! passes. The rule is fixed and documented here because silently
//! misclassifying one predicate would silently corrupt referential
//! ordering:
//!
//! - **NODES**: the object is a literal (an attribute assertion), or the
//!   predicate is `rdf:type` (type membership defines the node; type
//!   targets are taxonomy class labels, not loaded rows).
//! - **RELATIONSHIPS**: the object is an entity reference (IRI or blank
//!   node) under any other predicate.
//!
//! Classification is a pure function of (predicate, object kind) — the same
//! triple always resolves to the same pass regardless of input order.

use secgraph_ir::vocab::rdf;
use secgraph_ir::Triple;
use serde::{Deserialize, Serialize};

/// One of the two ordered bulk-write stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pass {
    /// Node-defining triples; always committed first.
    Nodes,
    /// Entity-to-entity references; only committed after NODES succeeded.
    Relationships,
}

impl Pass {
    /// Stable lowercase label (file names, logs, reports).
    pub fn label(&self) -> &'static str {
        match self {
            Pass::Nodes => "nodes",
            Pass::Relationships => "relationships",
        }
    }
}

impl std::fmt::Display for Pass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Classify one triple. Pure in (predicate, object kind).
pub fn classify(triple: &Triple) -> Pass {
    if triple.o.is_literal() || triple.predicate_iri() == rdf::TYPE {
        Pass::Nodes
    } else {
        Pass::Relationships
    }
}
