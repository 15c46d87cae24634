//! Error types for a single extraction attempt.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during one extraction attempt.
///
/// Every variant except [`ExtractionError::SchemaError`] is retryable from the
/// point of view of the metering layer. A schema error comes from compiling
/// the target schema, which happens before any model call.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The model produced no structured object.
    #[error("Empty AI response")]
    EmptyResponse,

    /// The structured-generation provider failed (network, model, or protocol error).
    #[error("AI generation failed: {0}")]
    Generation(String),

    /// The structured-generation call did not finish within the configured timeout.
    #[error("AI generation timed out after {0:?}")]
    Timeout(Duration),

    /// Model output could not be parsed as JSON.
    #[error("Could not parse AI response as JSON: {message}")]
    ParseError {
        /// Parse error message.
        message: String,
        /// Raw text that failed to parse.
        raw_text: String,
    },

    /// Model output parsed but did not conform to the target schema.
    #[error("AI response failed schema validation: {}", errors.join("; "))]
    Validation {
        /// Validation error messages with instance paths.
        errors: Vec<String>,
    },

    /// The target schema itself could not be compiled.
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// The validated value could not be deserialized into the requested type.
    #[error("Deserialization to target type failed: {0}")]
    Deserialize(String),
}
