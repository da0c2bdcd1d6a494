//! Validation pipeline error types.

use thiserror::Error;

/// Result type for validation operations.
pub type Result<T> = std::result::Result<T, ValidateError>;

/// Errors in the validation pipeline.
///
/// Non-conformance is never an error — it is the verdict. These are the
/// configuration and infrastructure failures that abort a single job.
#[derive(Debug, Error)]
pub enum ValidateError {
    /// Data file missing/unreadable or fatally malformed.
    #[error("data read failed: {0}")]
    Read(#[from] secgraph_turtle::TurtleError),

    /// Contract file missing or invalid.
    #[error("contract failed: {0}")]
    Contract(#[from] secgraph_shacl::ShaclError),

    /// Report could not be written or read back.
    #[error("report I/O failed for {path}: {source}")]
    ReportIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Report could not be serialized or parsed.
    #[error("report JSON failed for {path}: {source}")]
    ReportJson {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// A worker thread panicked (a bug, not a data problem).
    #[error("validation worker panicked: {0}")]
    WorkerPanic(String),
}
