//! Loader error types.

use crate::classify::Pass;
use thiserror::Error;

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoadError>;

/// A store write/reset failure, as reported by a sink implementation.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct SinkError {
    message: String,
}

impl SinkError {
    /// Wrap a sink-specific failure message.
    pub fn new(message: impl Into<String>) -> Self {
        SinkError {
            message: message.into(),
        }
    }
}

/// Errors in the two-phase loader.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Source could not be read (missing file, fatal parse failure).
    #[error("load read failed: {0}")]
    Read(#[from] secgraph_turtle::TurtleError),

    /// A sink write or reset failed. Fatal to the current pass: the pass
    /// aborts, the run is marked failed, and RELATIONSHIPS never begins if
    /// this happened during NODES.
    #[error("{pass} pass aborted at batch {batch}: {source}")]
    Sink {
        pass: Pass,
        batch: u64,
        #[source]
        source: SinkError,
    },
}
