//! Public error types for docimport.

use docimport_metering::GuardError;
use thiserror::Error;

use crate::router::RouterError;

/// Errors that can end an import.
///
/// The workflow never returns these directly; each is turned into a failed
/// [`ImportResult`](crate::types::ImportResult) whose `errors` carry the
/// `Display` message.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The file list was empty.
    #[error("No files provided")]
    NoFiles,

    /// More files than the configured maximum.
    #[error("Too many files: {count} provided, at most {max} allowed")]
    TooManyFiles {
        /// Files supplied.
        count: usize,
        /// Configured maximum.
        max: usize,
    },

    /// A file exceeded the configured maximum size.
    #[error("File \"{name}\" is too large: {size} bytes, at most {max} bytes allowed")]
    FileTooLarge {
        /// File name.
        name: String,
        /// Declared or estimated size.
        size: u64,
        /// Configured maximum.
        max: u64,
    },

    /// No route for the file's media type.
    #[error(transparent)]
    Router(#[from] RouterError),

    /// Configuration, credit, or extraction failure.
    #[error(transparent)]
    Extraction(#[from] GuardError),

    /// The validated object did not deserialize into the domain's type.
    #[error("AI response did not match the expected structure: {0}")]
    Parse(#[from] serde_json::Error),

    /// Failure raised by the domain's process or persist step.
    #[error("{0}")]
    Domain(#[from] anyhow::Error),
}
