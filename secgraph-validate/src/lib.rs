//! Parallel validation for the secgraph pipeline.
//!
//! Two layers of concurrency compose here:
//! 1. [`validate_unit`] parallelizes across *chunks within one unit*: a
//!    reader thread streams subject-aligned partitions into a bounded
//!    channel; a worker pool checks each against the conformance engine
//!    under a per-chunk timeout.
//! 2. [`run_standards`] parallelizes across *standards*: each (data file,
//!    contract, report path) job gets its own thread of control, and one
//!    standard's failure never blocks the others.
//!
//! Reports are persisted per job and can be merged with
//! [`consolidate_reports`].

pub mod error;
pub mod report;
pub mod runner;
pub mod scheduler;

pub use error::{Result, ValidateError};
pub use report::{consolidate_reports, report_path_for, UnitReport};
pub use runner::{run_standards, JobOutcome, RunnerSummary, StandardJob};
pub use scheduler::{validate_unit, UnitVerdict, ValidateConfig};
