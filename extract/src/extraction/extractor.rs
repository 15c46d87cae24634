//! Single-attempt extraction over the vision and text paths.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::Value;
use std::sync::Arc;
use tokio::time::Instant;

use super::config::ExtractionConfig;
use super::error::ExtractionError;
use super::metrics::{ExtractionMetrics, ExtractionPath, estimate_tokens};
use super::validation::CompiledSchema;
use crate::generator::{GenerationRequest, InlineData, ModelSelection, StructuredGenerator};

/// ZIP local-file-header signature; xlsx/ods containers start with it.
const ZIP_SIGNATURE: &str = "PK";

/// Which path an extraction should start on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMode {
    /// Send the payload as an inline data reference.
    Vision,
    /// Decode the payload as UTF-8 and send it as text.
    Text,
}

/// Everything one extraction attempt needs besides the model.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionInput<'a> {
    /// Base64-encoded payload.
    pub content_base64: &'a str,
    /// Declared media type of the payload.
    pub media_type: &'a str,
    /// Natural-language instruction.
    pub prompt: &'a str,
    /// Compiled target schema.
    pub schema: &'a CompiledSchema,
}

/// Runs a single structured-extraction attempt against a [`StructuredGenerator`].
///
/// Failures are returned, never retried here; retry and model fallback belong
/// to the metering layer that wraps this type.
#[derive(Clone)]
pub struct ExtractionCore {
    generator: Arc<dyn StructuredGenerator>,
    config: ExtractionConfig,
}

impl ExtractionCore {
    /// Creates a core with the default configuration.
    #[must_use]
    pub fn new(generator: Arc<dyn StructuredGenerator>) -> Self {
        Self {
            generator,
            config: ExtractionConfig::default(),
        }
    }

    /// Creates a core with the given configuration.
    #[must_use]
    pub fn with_config(generator: Arc<dyn StructuredGenerator>, config: ExtractionConfig) -> Self {
        Self { generator, config }
    }

    /// Returns the active configuration.
    #[must_use]
    pub const fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Extracts a schema-valid object starting on the path given by `mode`.
    ///
    /// # Errors
    ///
    /// Returns any [`ExtractionError`] raised by the chosen path.
    pub async fn extract(
        &self,
        mode: ExtractionMode,
        model: &ModelSelection,
        input: ExtractionInput<'_>,
    ) -> Result<(Value, ExtractionMetrics), ExtractionError> {
        match mode {
            ExtractionMode::Vision => self.extract_vision(model, input, false).await,
            ExtractionMode::Text => self.extract_text(model, input).await,
        }
    }

    /// Convenience method that extracts and deserializes to a typed value.
    ///
    /// # Errors
    ///
    /// Returns `ExtractionError::Deserialize` if the validated value does not
    /// fit `T`, or any error from [`Self::extract`].
    pub async fn extract_typed<T>(
        &self,
        mode: ExtractionMode,
        model: &ModelSelection,
        input: ExtractionInput<'_>,
    ) -> Result<(T, ExtractionMetrics), ExtractionError>
    where
        T: serde::de::DeserializeOwned,
    {
        let (value, metrics) = self.extract(mode, model, input).await?;
        let typed = serde_json::from_value(value)
            .map_err(|e| ExtractionError::Deserialize(e.to_string()))?;
        Ok((typed, metrics))
    }

    /// Vision path: one call carrying the instruction and the inline payload.
    ///
    /// This path never hands off to another path, which bounds the text path's
    /// re-route to a single hop.
    async fn extract_vision(
        &self,
        model: &ModelSelection,
        input: ExtractionInput<'_>,
        rerouted: bool,
    ) -> Result<(Value, ExtractionMetrics), ExtractionError> {
        let request = GenerationRequest {
            model: model.clone(),
            prompt: input.prompt.to_string(),
            inline: Some(InlineData {
                data_base64: input.content_base64.to_string(),
                media_type: input.media_type.to_string(),
            }),
            schema: input.schema.as_value().clone(),
        };
        let path = if rerouted {
            ExtractionPath::VisionRerouted
        } else {
            ExtractionPath::Vision
        };
        self.run(request, input.schema, path, false).await
    }

    /// Text path: decode, clip, and send inside a fenced block.
    ///
    /// Payloads that are not valid base64 or UTF-8, or whose text starts with
    /// the ZIP signature, go to the vision path instead.
    async fn extract_text(
        &self,
        model: &ModelSelection,
        input: ExtractionInput<'_>,
    ) -> Result<(Value, ExtractionMetrics), ExtractionError> {
        let text = match decode_text(input.content_base64) {
            Some(text) if !text.starts_with(ZIP_SIGNATURE) => text,
            Some(_) => {
                tracing::info!(
                    event = "vision_reroute",
                    reason = "zip_container",
                    media_type = input.media_type,
                    "vision_reroute"
                );
                return self.extract_vision(model, input, true).await;
            }
            None => {
                tracing::info!(
                    event = "vision_reroute",
                    reason = "decode_failed",
                    media_type = input.media_type,
                    "vision_reroute"
                );
                return self.extract_vision(model, input, true).await;
            }
        };

        let (clipped, truncated) = clip_chars(&text, self.config.text_char_limit);
        if truncated {
            tracing::debug!(
                event = "text_truncated",
                limit = self.config.text_char_limit,
                "text_truncated"
            );
        }

        let request = GenerationRequest {
            model: model.clone(),
            prompt: format!("{}\n\n```\n{clipped}\n```", input.prompt),
            inline: None,
            schema: input.schema.as_value().clone(),
        };
        self.run(request, input.schema, ExtractionPath::Text, truncated).await
    }

    async fn run(
        &self,
        request: GenerationRequest,
        schema: &CompiledSchema,
        path: ExtractionPath,
        truncated: bool,
    ) -> Result<(Value, ExtractionMetrics), ExtractionError> {
        let start = Instant::now();
        let input_tokens = estimate_tokens(&request.prompt);

        tracing::debug!(
            event = "generation_started",
            model = %request.model.model_id,
            path = path.as_str(),
            "generation_started"
        );

        let output = tokio::time::timeout(self.config.timeout, self.generator.generate(request))
            .await
            .map_err(|_| ExtractionError::Timeout(self.config.timeout))??;

        let value = schema.validate(output)?;

        let metrics = ExtractionMetrics {
            path,
            truncated,
            wall_time: start.elapsed(),
            estimated_input_tokens: input_tokens,
            estimated_output_tokens: estimate_tokens(&value.to_string()),
        };
        Ok((value, metrics))
    }
}

/// Derives a JSON Schema value for `T`.
#[must_use]
pub fn schema_for<T: schemars::JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or_else(|_| serde_json::json!({}))
}

/// Decodes base64 text, ignoring line breaks from MIME-style wrapping.
fn decode_text(content_base64: &str) -> Option<String> {
    let compact: String = content_base64.split_ascii_whitespace().collect();
    let bytes = BASE64.decode(compact).ok()?;
    String::from_utf8(bytes).ok()
}

fn clip_chars(text: &str, limit: usize) -> (&str, bool) {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => (&text[..byte_idx], true),
        None => (text, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replays canned results and records every request.
    struct ScriptedGenerator {
        output: Option<Value>,
        requests: Mutex<Vec<GenerationRequest>>,
        delay: Option<Duration>,
    }

    impl ScriptedGenerator {
        fn returning(output: Option<Value>) -> Arc<Self> {
            Arc::new(Self {
                output,
                requests: Mutex::new(Vec::new()),
                delay: None,
            })
        }

        fn requests(&self) -> Vec<GenerationRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StructuredGenerator for ScriptedGenerator {
        async fn generate(
            &self,
            request: GenerationRequest,
        ) -> Result<Option<Value>, ExtractionError> {
            self.requests.lock().unwrap().push(request);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(self.output.clone())
        }
    }

    fn schema() -> CompiledSchema {
        CompiledSchema::compile(&json!({
            "type": "object",
            "properties": {"foo": {"type": "integer"}},
            "required": ["foo"]
        }))
        .unwrap()
    }

    fn input<'a>(
        content: &'a str,
        media_type: &'a str,
        schema: &'a CompiledSchema,
    ) -> ExtractionInput<'a> {
        ExtractionInput {
            content_base64: content,
            media_type,
            prompt: "Extract foo",
            schema,
        }
    }

    #[tokio::test]
    async fn test_vision_path_sends_inline_payload() {
        let generator = ScriptedGenerator::returning(Some(json!({"foo": 1})));
        let core = ExtractionCore::new(generator.clone());
        let schema = schema();

        let (value, metrics) = core
            .extract(
                ExtractionMode::Vision,
                &ModelSelection::new("vision-model"),
                input("aGVsbG8=", "image/png", &schema),
            )
            .await
            .unwrap();

        assert_eq!(value, json!({"foo": 1}));
        assert_eq!(metrics.path, ExtractionPath::Vision);

        let requests = generator.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].prompt, "Extract foo");
        assert_eq!(requests[0].model.model_id, "vision-model");
        let inline = requests[0].inline.as_ref().unwrap();
        assert_eq!(inline.data_base64, "aGVsbG8=");
        assert_eq!(inline.media_type, "image/png");
    }

    #[tokio::test]
    async fn test_text_path_wraps_decoded_text_in_fence() {
        let generator = ScriptedGenerator::returning(Some(json!({"foo": 2})));
        let core = ExtractionCore::new(generator.clone());
        let schema = schema();
        let content = BASE64.encode("name,value\nfoo,2\n");

        let (_, metrics) = core
            .extract(
                ExtractionMode::Text,
                &ModelSelection::new("text-model"),
                input(&content, "text/csv", &schema),
            )
            .await
            .unwrap();

        assert_eq!(metrics.path, ExtractionPath::Text);
        assert!(!metrics.truncated);
        let requests = generator.requests();
        assert!(requests[0].inline.is_none());
        assert_eq!(
            requests[0].prompt,
            "Extract foo\n\n```\nname,value\nfoo,2\n\n```"
        );
    }

    #[tokio::test]
    async fn test_text_path_truncates_by_characters() {
        let generator = ScriptedGenerator::returning(Some(json!({"foo": 3})));
        let core = ExtractionCore::with_config(
            generator.clone(),
            ExtractionConfig::default().with_text_char_limit(4),
        );
        let schema = schema();
        let content = BASE64.encode("héllo wörld");

        let (_, metrics) = core
            .extract(
                ExtractionMode::Text,
                &ModelSelection::new("text-model"),
                input(&content, "text/plain", &schema),
            )
            .await
            .unwrap();

        assert!(metrics.truncated);
        assert!(generator.requests()[0].prompt.ends_with("```\nhéll\n```"));
    }

    #[tokio::test]
    async fn test_wrapped_base64_stays_on_text_path() {
        let generator = ScriptedGenerator::returning(Some(json!({"foo": 2})));
        let core = ExtractionCore::new(generator.clone());
        let schema = schema();

        let (_, metrics) = core
            .extract(
                ExtractionMode::Text,
                &ModelSelection::new("text-model"),
                input("bmFtZSx2YWx1\r\nZQpmb28sMgo=\n", "text/csv", &schema),
            )
            .await
            .unwrap();

        assert_eq!(metrics.path, ExtractionPath::Text);
        let requests = generator.requests();
        assert!(requests[0].inline.is_none());
        assert!(requests[0].prompt.contains("name,value\nfoo,2"));
    }

    #[tokio::test]
    async fn test_zip_signature_reroutes_to_vision_once() {
        let generator = ScriptedGenerator::returning(Some(json!({"foo": 4})));
        let core = ExtractionCore::new(generator.clone());
        let schema = schema();
        let content = BASE64.encode(b"PK\x03\x04rest-of-zip");

        let (_, metrics) = core
            .extract(
                ExtractionMode::Text,
                &ModelSelection::new("text-model"),
                input(&content, "application/vnd.ms-excel", &schema),
            )
            .await
            .unwrap();

        assert_eq!(metrics.path, ExtractionPath::VisionRerouted);
        let requests = generator.requests();
        assert_eq!(requests.len(), 1);
        let inline = requests[0].inline.as_ref().unwrap();
        assert_eq!(inline.data_base64, content);
        assert_eq!(inline.media_type, "application/vnd.ms-excel");
    }

    #[tokio::test]
    async fn test_invalid_utf8_reroutes_to_vision() {
        let generator = ScriptedGenerator::returning(Some(json!({"foo": 5})));
        let core = ExtractionCore::new(generator.clone());
        let schema = schema();
        let content = BASE64.encode([0xff, 0xfe, 0x00, 0x41]);

        let (_, metrics) = core
            .extract(
                ExtractionMode::Text,
                &ModelSelection::new("text-model"),
                input(&content, "application/msword", &schema),
            )
            .await
            .unwrap();

        assert_eq!(metrics.path, ExtractionPath::VisionRerouted);
        assert_eq!(generator.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_response_is_an_error() {
        let generator = ScriptedGenerator::returning(None);
        let core = ExtractionCore::new(generator);
        let schema = schema();

        let err = core
            .extract(
                ExtractionMode::Vision,
                &ModelSelection::new("m"),
                input("aGVsbG8=", "image/png", &schema),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_schema_mismatch_is_an_error() {
        let generator = ScriptedGenerator::returning(Some(json!({"foo": "not a number"})));
        let core = ExtractionCore::new(generator);
        let schema = schema();

        let err = core
            .extract(
                ExtractionMode::Vision,
                &ModelSelection::new("m"),
                input("aGVsbG8=", "image/png", &schema),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Validation { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_reported() {
        let generator = Arc::new(ScriptedGenerator {
            output: Some(json!({"foo": 1})),
            requests: Mutex::new(Vec::new()),
            delay: Some(Duration::from_secs(10)),
        });
        let core = ExtractionCore::with_config(
            generator,
            ExtractionConfig::default().with_timeout(Duration::from_secs(1)),
        );
        let schema = schema();

        let err = core
            .extract(
                ExtractionMode::Vision,
                &ModelSelection::new("m"),
                input("aGVsbG8=", "image/png", &schema),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Timeout(d) if d == Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn test_extract_typed() {
        #[derive(serde::Deserialize)]
        struct Foo {
            foo: i64,
        }

        let generator = ScriptedGenerator::returning(Some(json!({"foo": 9})));
        let core = ExtractionCore::new(generator);
        let schema = schema();

        let (typed, _) = core
            .extract_typed::<Foo>(
                ExtractionMode::Vision,
                &ModelSelection::new("m"),
                input("aGVsbG8=", "image/png", &schema),
            )
            .await
            .unwrap();
        assert_eq!(typed.foo, 9);
    }

    #[test]
    fn test_clip_chars() {
        assert_eq!(clip_chars("abc", 5), ("abc", false));
        assert_eq!(clip_chars("abc", 3), ("abc", false));
        assert_eq!(clip_chars("abcd", 3), ("abc", true));
        assert_eq!(clip_chars("日本語テキスト", 2), ("日本", true));
    }

    #[test]
    fn test_schema_for_derives_object_schema() {
        #[derive(schemars::JsonSchema)]
        #[allow(dead_code)]
        struct Measurement {
            weight_kg: f64,
        }

        let schema = schema_for::<Measurement>();
        assert_eq!(schema["type"], "object");
        assert!(schema["properties"]["weight_kg"].is_object());
    }
}
