//! Extraction core for AI-assisted document import.
//!
//! This crate turns an opaque base64 payload into an object that validates
//! against a caller-supplied JSON Schema, by way of a pluggable
//! [`StructuredGenerator`](generator::StructuredGenerator).

pub mod extraction;
pub mod generator;

/// Common traits and types for ergonomic usage of the extraction core.
pub mod prelude {
    pub use crate::extraction::{
        CompiledSchema, ExtractionConfig, ExtractionCore, ExtractionError, ExtractionInput,
        ExtractionMetrics, ExtractionMode, ExtractionPath, schema_for,
    };
    pub use crate::generator::{GenerationRequest, InlineData, ModelSelection, StructuredGenerator};
}
