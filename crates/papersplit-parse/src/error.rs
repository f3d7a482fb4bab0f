//! Error types for the extraction and writing layers.
//!
//! Uses [`thiserror`] for ergonomic error derivation.

use thiserror::Error;

/// Error type for PDF backend operations.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Error from PDF parsing (structure, syntax, object resolution).
    #[error("PDF parse error: {0}")]
    Parse(String),

    /// Error reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The document is encrypted and cannot be read without a password.
    #[error("PDF is encrypted")]
    Encrypted,

    /// A page index outside the document.
    #[error("page {index} out of range (document has {count} pages)")]
    InvalidPage { index: usize, count: usize },

    /// Error while producing an output PDF.
    #[error("PDF write error: {0}")]
    Write(String),
}

impl From<lopdf::Error> for BackendError {
    fn from(err: lopdf::Error) -> Self {
        BackendError::Parse(err.to_string())
    }
}
