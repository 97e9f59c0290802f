//! Error types for property list decoding and encoding

use thiserror::Error;

/// Result type for property list operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading or writing property lists
#[derive(Error, Debug)]
pub enum Error {
    /// The input text is not a well-formed property list
    #[error("syntax error at line {line}, column {column}: {message}")]
    Syntax {
        /// 1-based line of the offending character
        line: usize,
        /// 1-based column of the offending character
        column: usize,
        /// Description of what was expected
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
