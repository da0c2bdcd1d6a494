//! Shape-contract validation engine for secgraph.
//!
//! Validation works by:
//! 1. Loading a declarative JSON contract into [`ShapeContract`] (regexes
//!    compiled eagerly; a broken contract fails the job up front)
//! 2. Selecting applicable shapes per subject via `rdf:type`
//! 3. Checking each subject's triples against the shape's property
//!    constraints
//! 4. Producing a [`ConformanceVerdict`] per partition with conformance
//!    status and any violations
//!
//! Violations are data, not errors — a non-conforming partition gates
//! ingestion but never aborts sibling work.
//!
//! # Supported constraints
//!
//! - Cardinality: `min_count`, `max_count`
//! - Value type: `datatype`, `node_kind`
//! - String: `pattern` (with optional regex flags)
//! - Value: `in`
//! - Closed shapes: `closed` + `ignored_properties`

pub mod constraints;
pub mod contract;
pub mod engine;
pub mod error;

pub use constraints::{Constraint, ConstraintViolation, NodeKind};
pub use contract::{CompiledShape, PropertyShape, ShapeContract};
pub use engine::{ConformanceVerdict, ShapeEngine, Violation};
pub use error::{Result, ShaclError};
