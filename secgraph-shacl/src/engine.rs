//! The conformance engine: checks one partition against a compiled contract.
//!
//! `check()` is a pure function of (partition, contract) — stateless per
//! call and safely shared by reference across worker threads. Violations are
//! emitted in stable (subject, shape, property) order so repeated runs of
//! the same unit produce byte-identical reports.

use crate::constraints::cardinality::{validate_max_count, validate_min_count};
use crate::constraints::datatype::{display_value, validate_datatype, validate_node_kind};
use crate::constraints::pattern::validate_pattern;
use crate::constraints::value::validate_in;
use crate::constraints::{Constraint, ConstraintViolation};
use crate::contract::{CompiledShape, ShapeContract};
use rustc_hash::{FxHashMap, FxHashSet};
use secgraph_ir::vocab::rdf;
use secgraph_ir::{EntityPartition, Term, Triple};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// One reportable violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// The focus node (subject) the violation is about
    pub focus: String,
    /// The shape kind that applied (or a synthetic marker)
    pub kind: String,
    /// The constrained property path, when the violation is property-scoped
    pub path: Option<String>,
    /// Constraint description
    pub constraint: String,
    /// Human-readable message
    pub message: String,
}

impl Violation {
    /// Synthetic violation for a chunk whose validation call timed out.
    ///
    /// A timeout is a violation, not a crash: the unit must not load, but
    /// sibling chunks keep validating.
    pub fn timeout(chunk_id: usize, timeout_secs: f64) -> Self {
        Violation {
            focus: format!("chunk {chunk_id}"),
            kind: "*".to_string(),
            path: None,
            constraint: "timeout".to_string(),
            message: format!("validation timeout after {timeout_secs:.1}s"),
        }
    }

    /// Synthetic violation for a chunk whose validation worker failed.
    pub fn worker_failure(chunk_id: usize, detail: &str) -> Self {
        Violation {
            focus: format!("chunk {chunk_id}"),
            kind: "*".to_string(),
            path: None,
            constraint: "worker".to_string(),
            message: format!("validation worker failed: {detail}"),
        }
    }
}

/// The conformance verdict for one chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConformanceVerdict {
    /// Logical AND over all constraint checks in the chunk
    pub conforms: bool,
    /// The chunk this verdict is about
    pub chunk_id: usize,
    /// Violations in stable (subject, shape, property) order
    pub violations: Vec<Violation>,
    /// Wall-clock seconds the check took
    pub elapsed_secs: f64,
}

impl ConformanceVerdict {
    /// Verdict for a chunk that exceeded the per-call timeout.
    pub fn timed_out(chunk_id: usize, timeout_secs: f64) -> Self {
        ConformanceVerdict {
            conforms: false,
            chunk_id,
            violations: vec![Violation::timeout(chunk_id, timeout_secs)],
            elapsed_secs: timeout_secs,
        }
    }
}

/// Conformance engine for one compiled contract.
pub struct ShapeEngine {
    contract: ShapeContract,
    /// kind IRI -> indexes into the contract's shape list (contract order)
    by_kind: FxHashMap<String, Vec<usize>>,
}

impl ShapeEngine {
    /// Build an engine from a compiled contract.
    pub fn new(contract: ShapeContract) -> Self {
        let mut by_kind: FxHashMap<String, Vec<usize>> = FxHashMap::default();
        for (i, shape) in contract.shapes().iter().enumerate() {
            by_kind.entry(shape.kind.clone()).or_default().push(i);
        }
        ShapeEngine { contract, by_kind }
    }

    /// The underlying contract.
    pub fn contract(&self) -> &ShapeContract {
        &self.contract
    }

    /// True when there are no shapes — validation is a no-op and every
    /// partition conforms vacuously.
    pub fn is_empty(&self) -> bool {
        self.contract.is_empty()
    }

    /// Check one partition. Never fails: violations are data.
    pub fn check(&self, partition: &EntityPartition) -> ConformanceVerdict {
        let start = Instant::now();
        let mut violations = Vec::new();

        if !self.is_empty() {
            for (subject, triples) in partition.subjects() {
                self.check_subject(subject, triples, &mut violations);
            }
        }

        let conforms = violations.is_empty();
        ConformanceVerdict {
            conforms,
            chunk_id: partition.id,
            violations,
            elapsed_secs: start.elapsed().as_secs_f64(),
        }
    }

    fn check_subject(&self, subject: &Term, triples: &[Triple], out: &mut Vec<Violation>) {
        // Applicable shapes: selected by rdf:type, deduplicated, in contract
        // order. Subjects with no matching shape conform vacuously.
        let mut shape_idx: Vec<usize> = Vec::new();
        let mut seen = FxHashSet::default();
        for t in triples {
            if t.predicate_iri() != rdf::TYPE {
                continue;
            }
            let Some(type_iri) = t.o.as_iri() else {
                continue;
            };
            if let Some(idxs) = self.by_kind.get(type_iri) {
                for &i in idxs {
                    if seen.insert(i) {
                        shape_idx.push(i);
                    }
                }
            }
        }
        shape_idx.sort_unstable();

        let focus = display_value(subject);
        for i in shape_idx {
            let shape = &self.contract.shapes()[i];
            check_shape(&focus, shape, triples, out);
        }
    }
}

fn check_shape(focus: &str, shape: &CompiledShape, triples: &[Triple], out: &mut Vec<Violation>) {
    for prop in &shape.properties {
        let values: Vec<&Term> = triples
            .iter()
            .filter(|t| t.predicate_iri() == prop.path)
            .map(|t| &t.o)
            .collect();

        for constraint in &prop.constraints {
            let found: Vec<ConstraintViolation> = match constraint {
                Constraint::MinCount(min) => {
                    validate_min_count(&values, *min).into_iter().collect()
                }
                Constraint::MaxCount(max) => {
                    validate_max_count(&values, *max).into_iter().collect()
                }
                Constraint::Datatype(dt) => validate_datatype(&values, dt),
                Constraint::NodeKind(kind) => validate_node_kind(&values, *kind),
                Constraint::Pattern(re) => validate_pattern(&values, re),
                Constraint::In(allowed) => validate_in(&values, allowed),
            };
            for v in found {
                out.push(Violation {
                    focus: focus.to_string(),
                    kind: shape.kind.clone(),
                    path: Some(prop.path.clone()),
                    constraint: v.constraint.description(),
                    message: match v.value {
                        Some(value) => format!("{} (value: {})", v.message, value),
                        None => v.message,
                    },
                });
            }
        }
    }

    if shape.closed {
        // Declared paths, ignored paths, and rdf:type are allowed; anything
        // else violates. One violation per offending predicate, first
        // appearance order.
        let declared: FxHashSet<&str> = shape
            .properties
            .iter()
            .map(|p| p.path.as_str())
            .chain(shape.ignored.iter().map(|s| s.as_str()))
            .chain(std::iter::once(rdf::TYPE))
            .collect();
        let mut flagged = FxHashSet::default();
        for t in triples {
            let p = t.predicate_iri();
            if !declared.contains(p) && flagged.insert(p.to_string()) {
                out.push(Violation {
                    focus: focus.to_string(),
                    kind: shape.kind.clone(),
                    path: Some(p.to_string()),
                    constraint: "closed".to_string(),
                    message: format!("Property {} is not declared on a closed shape", p),
                });
            }
        }
    }
}
