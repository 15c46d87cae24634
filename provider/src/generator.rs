//! Structured generation over a Rig completion client.

use async_trait::async_trait;
use docimport_extract::extraction::validation::{build_schema_instruction, parse_structured_output};
use docimport_extract::extraction::ExtractionError;
use docimport_extract::generator::{GenerationRequest, StructuredGenerator};
use rig::client::CompletionClient;
use rig::completion::CompletionModel;
use serde_json::Value;
use std::sync::Arc;

use crate::errors::ProviderError;
use crate::utils::{format_chat_history, response_text, user_message};

/// Builds a client authenticated with the given API key.
pub type KeyedClientFactory<C> = Arc<dyn Fn(&str) -> Result<C, ProviderError> + Send + Sync>;

/// A [`StructuredGenerator`] backed by a Rig completion client.
///
/// Each call builds a fresh completion model for the requested model id, so
/// one generator serves both the primary and the fallback model.
///
/// Requests without an API key use the default client. A request carrying a
/// key is served by a client from the keyed factory; without a factory such a
/// request fails rather than running under the default credentials.
#[derive(Clone)]
pub struct RigGenerator<C> {
    client: C,
    keyed_client: Option<KeyedClientFactory<C>>,
}

impl<C> RigGenerator<C> {
    /// Wraps a Rig completion client.
    #[must_use]
    pub const fn new(client: C) -> Self {
        Self {
            client,
            keyed_client: None,
        }
    }

    /// Sets the factory used for requests that carry their own API key.
    #[must_use]
    pub fn with_keyed_client<F>(mut self, factory: F) -> Self
    where
        F: Fn(&str) -> Result<C, ProviderError> + Send + Sync + 'static,
    {
        self.keyed_client = Some(Arc::new(factory));
        self
    }

    /// Returns the default client.
    #[must_use]
    pub const fn client(&self) -> &C {
        &self.client
    }
}

impl<C> RigGenerator<C>
where
    C: CompletionClient + Send + Sync,
{
    fn completion_model(
        &self,
        model_id: &str,
        api_key: Option<&str>,
    ) -> Result<C::CompletionModel, ProviderError> {
        let Some(api_key) = api_key else {
            return Ok(self.client.completion_model(model_id));
        };
        let factory = self
            .keyed_client
            .as_ref()
            .ok_or(ProviderError::KeyedClientUnavailable)?;
        tracing::debug!(event = "keyed_client", model = model_id, "keyed_client");
        Ok(factory(api_key)?.completion_model(model_id))
    }

    async fn complete(&self, request: GenerationRequest) -> Result<String, ProviderError> {
        let model =
            self.completion_model(&request.model.model_id, request.model.api_key.as_deref())?;
        let message = user_message(&request.prompt, request.inline.as_ref())?;
        let completion_request = model
            .completion_request(message)
            .preamble(build_schema_instruction(&request.schema))
            .build();

        tracing::trace!(
            event = "completion_request",
            model = %request.model.model_id,
            rendered = %format_chat_history(&completion_request),
            "completion_request"
        );

        let response = model.completion(completion_request).await?;
        Ok(response_text(&response.choice))
    }
}

#[async_trait]
impl<C> StructuredGenerator for RigGenerator<C>
where
    C: CompletionClient + Send + Sync,
{
    async fn generate(&self, request: GenerationRequest) -> Result<Option<Value>, ExtractionError> {
        let text = self.complete(request).await?;
        parse_structured_output(&text)
    }
}
