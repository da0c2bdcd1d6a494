//! Reader error types.

use std::io;
use thiserror::Error;

/// Result type for reader operations.
pub type Result<T> = std::result::Result<T, TurtleError>;

/// Errors produced while reading a serialized graph file.
#[derive(Debug, Error)]
pub enum TurtleError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("line {line}: {message}")]
    Syntax { line: u64, message: String },

    #[error("line {line}: undeclared prefix '{prefix}'")]
    UndeclaredPrefix { line: u64, prefix: String },

    #[error("prefix/base directive at line {line} after data has started; all directives must appear in the file header")]
    DirectiveAfterData { line: u64 },

    #[error("parse error count exceeded tolerance of {tolerance} at line {line}; aborting read")]
    TooManyParseErrors { tolerance: usize, line: u64 },
}

impl TurtleError {
    /// Syntax error helper with the offending line number.
    pub fn syntax(line: u64, message: impl Into<String>) -> Self {
        TurtleError::Syntax {
            line,
            message: message.into(),
        }
    }
}
