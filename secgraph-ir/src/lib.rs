//! Graph IR for the secgraph ingestion pipeline.
//!
//! This crate defines the data model every other secgraph crate speaks:
//! - [`Term`]: IRI, blank node, or typed literal
//! - [`Triple`]: one (subject, predicate, object) statement
//! - [`EntityPartition`]: a bounded, subject-aligned group of triples — the
//!   unit of validation and loading
//! - [`vocab`]: well-known IRIs (RDF/XSD plus the security-taxonomy
//!   namespaces used by shape contracts and tests)
//!
//! Terms are immutable once constructed and cheap to clone (`Arc<str>`
//! backed). Predicates are always IRIs; subjects are IRIs or blank nodes.

pub mod datatype;
pub mod partition;
pub mod term;
pub mod triple;
pub mod vocab;

pub use datatype::Datatype;
pub use partition::EntityPartition;
pub use term::{LiteralValue, Term};
pub use triple::Triple;
