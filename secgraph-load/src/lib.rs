//! Two-phase bulk loading for the secgraph pipeline.
//!
//! A validated unit is written to the graph store in two strictly ordered
//! passes — all node-defining triples, then all relationship triples — in
//! batched writes stamped with a [`DbVersion`]. Dry-run mode classifies and
//! counts without touching the sink. See [`classify`](classify::classify)
//! for the fixed pass-classification rule.

pub mod classify;
pub mod error;
pub mod loader;
pub mod progress;
pub mod sink;

pub use classify::{classify, Pass};
pub use error::{LoadError, Result, SinkError};
pub use loader::{dry_run, load_pass, load_unit, DryRunReport, LoadConfig, LoadSummary, PassSummary};
pub use progress::ProgressPrinter;
pub use sink::{DbVersion, GraphStoreSink, JsonlDirSink, LoadBatch, MemorySink, WriteRecord};
