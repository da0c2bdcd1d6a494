//! Shape contract error types.

use thiserror::Error;

/// Result type for contract operations.
pub type Result<T> = std::result::Result<T, ShaclError>;

/// Errors compiling or applying a shape contract.
///
/// Conformance *violations* are not errors — they are reportable data
/// carried by the verdict. Only broken contracts and I/O surface here.
#[derive(Debug, Error)]
pub enum ShaclError {
    #[error("failed to read contract {path}: {source}")]
    ContractRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid contract JSON in {path}: {source}")]
    ContractJson {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid regex pattern '{pattern}' on shape {kind}: {message}")]
    InvalidPattern {
        kind: String,
        pattern: String,
        message: String,
    },

    #[error("shape {kind}: {message}")]
    InvalidShape { kind: String, message: String },
}
