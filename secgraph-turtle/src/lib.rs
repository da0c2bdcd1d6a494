//! Streaming Turtle-subset reader for the secgraph pipeline.
//!
//! The input format is line-oriented: one statement per logical line, `#`
//! comments, `@prefix`/`@base` (and SPARQL-style `PREFIX`/`BASE`) directives
//! in the file header. The reader streams the file into subject-aligned
//! [`EntityPartition`](secgraph_ir::EntityPartition)s without ever holding
//! the whole file in memory.
//!
//! # Example
//!
//! ```no_run
//! use secgraph_turtle::{ChunkedTripleReader, ReaderConfig};
//! use std::path::Path;
//!
//! let config = ReaderConfig { chunk_subjects: 1000, ..ReaderConfig::default() };
//! let reader = ChunkedTripleReader::open(Path::new("cve.ttl"), &config)?;
//! for partition in reader {
//!     let partition = partition?;
//!     println!("partition {} with {} triples", partition.id, partition.len());
//! }
//! # Ok::<(), secgraph_turtle::TurtleError>(())
//! ```

pub mod error;
pub mod reader;
pub mod statement;

pub use error::{Result, TurtleError};
pub use reader::{ChunkedTripleReader, ParseMode, ProgressFn, ReaderConfig};
pub use statement::{parse_statement, parse_statement_fast, Directive, Prefixes};
