//! Error types shared by the generation library.
//!
//! Every component fault surfaces as a [`GenerateError`] at the assembler
//! boundary. Binaries wrap it in `anyhow` for reporting.

use std::path::PathBuf;
use thiserror::Error;

/// Boxed cause attached to [`GenerateError::SubstitutionFailure`].
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The unified error type returned by the public generation API.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// The selected document kind / region / scheme has no template file.
    #[error("no template for {key}: {} does not exist", path.display())]
    TemplateNotFound { key: String, path: PathBuf },

    /// Any fault while loading, editing or saving a template.
    #[error("template edit failed: {0}")]
    SubstitutionFailure(#[source] BoxedCause),

    /// The image placeholder is absent from every paragraph and cell.
    #[error("placeholder not found: {0}")]
    PlaceholderNotFound(String),

    /// The counter file holds something other than an integer.
    #[error("invoice counter at {} is corrupt: {content:?}", path.display())]
    CounterCorruption { path: PathBuf, content: String },

    /// The counter could not be read, locked or written.
    #[error("invoice counter unavailable: {0}")]
    Counter(#[source] std::io::Error),

    /// Caller-supplied field values were rejected.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl GenerateError {
    /// Wrap any lower-level fault as a substitution failure.
    pub fn edit(cause: impl Into<BoxedCause>) -> Self {
        GenerateError::SubstitutionFailure(cause.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        GenerateError::InvalidInput(msg.into())
    }
}

pub type Result<T, E = GenerateError> = std::result::Result<T, E>;
