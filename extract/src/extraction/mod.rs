//! Single-attempt structured extraction.
//!
//! This module provides the core types for turning one payload into one
//! schema-valid object:
//!
//! - [`ExtractionCore`] - Vision and text paths with a one-way vision re-route
//! - [`ExtractionError`] - Typed error enum for a failed attempt
//! - [`ExtractionMetrics`] - Path, truncation, timing, and token metrics
//! - [`ExtractionConfig`] - Truncation limit and call timeout
//! - [`validation`] - Schema validation and reply parsing helpers

pub mod config;
pub mod error;
pub mod extractor;
pub mod metrics;
pub mod validation;

pub use config::{ExtractionConfig, GENERATION_TIMEOUT, TEXT_CHAR_LIMIT};
pub use error::ExtractionError;
pub use extractor::{ExtractionCore, ExtractionInput, ExtractionMode, schema_for};
pub use metrics::{ExtractionMetrics, ExtractionPath, estimate_tokens};
pub use validation::CompiledSchema;
