//! The structured-generation seam.
//!
//! A [`StructuredGenerator`] turns an instruction plus optional inline content
//! into a JSON value that should conform to a target schema. Implementations
//! talk to a real model; the extraction core validates whatever comes back.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

use crate::extraction::ExtractionError;

/// Model identifier and credentials for one call.
#[derive(Clone, PartialEq, Eq)]
pub struct ModelSelection {
    /// Provider-specific model identifier.
    pub model_id: String,
    /// API key override; `None` uses the provider's own credentials.
    pub api_key: Option<String>,
}

impl ModelSelection {
    /// Selects `model_id` with the provider's default credentials.
    #[must_use]
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            api_key: None,
        }
    }

    /// Sets an API key override.
    #[must_use]
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }
}

impl fmt::Debug for ModelSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSelection")
            .field("model_id", &self.model_id)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Binary content attached to a call as an inline data reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineData {
    /// Base64-encoded payload.
    pub data_base64: String,
    /// Declared media type of the payload (e.g. `image/png`).
    pub media_type: String,
}

/// One structured-generation call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Model to call.
    pub model: ModelSelection,
    /// Full user message text.
    pub prompt: String,
    /// Inline payload for the vision path; `None` on the text path.
    pub inline: Option<InlineData>,
    /// JSON Schema the reply must satisfy.
    pub schema: Value,
}

/// A provider of schema-constrained model output.
///
/// Implementations return `Ok(None)` when the model yields no object; the
/// extraction core turns that into an explicit empty-response error.
/// Network and model failures are reported as
/// [`ExtractionError::Generation`].
#[async_trait]
pub trait StructuredGenerator: Send + Sync {
    /// Runs one call and returns the model's structured output, if any.
    async fn generate(&self, request: GenerationRequest) -> Result<Option<Value>, ExtractionError>;
}
