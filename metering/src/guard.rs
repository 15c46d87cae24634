//! Credit-gated extraction with bounded retry and a one-time model fallback.

use docimport_extract::extraction::{
    CompiledSchema, ExtractionCore, ExtractionError, ExtractionInput, ExtractionMetrics,
};
use docimport_extract::generator::ModelSelection;
use serde_json::{Value, json};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::time::Instant;

use crate::error::{AttemptRecord, ConfigError, GuardError};
use crate::ledger::{CONSUMPTION_KIND, CreditConsumption, CreditGrant, CreditLedger, REFUND_KIND};
use crate::retry::{RetryState, attempt_progress, backoff_delay};
use crate::routing::{ConfigSource, FileCategory, ModelRoutingConfig, RoutingOverrides};

/// Progress callback: a human-readable message and a fraction in `[0, 1]`.
pub type ProgressFn = Arc<dyn Fn(&str, f32) + Send + Sync>;

/// One extraction, spanning every retry.
#[derive(Clone)]
pub struct ExtractionRequest {
    /// Base64-encoded payload.
    pub content_base64: String,
    /// Declared media type of the payload.
    pub media_type: String,
    /// Natural-language instruction.
    pub instruction_prompt: String,
    /// Target JSON Schema.
    pub target_schema: Value,
    /// User whose credits pay for the extraction.
    pub requesting_user_id: String,
    /// Category used to pick model and cost.
    pub file_type_category: FileCategory,
    /// Per-request routing overrides.
    pub overrides: RoutingOverrides,
    /// Called before each attempt.
    pub on_progress: Option<ProgressFn>,
}

impl ExtractionRequest {
    /// Builds a request with no overrides and no progress callback.
    #[must_use]
    pub fn new(
        content_base64: impl Into<String>,
        media_type: impl Into<String>,
        instruction_prompt: impl Into<String>,
        target_schema: Value,
        requesting_user_id: impl Into<String>,
        file_type_category: FileCategory,
    ) -> Self {
        Self {
            content_base64: content_base64.into(),
            media_type: media_type.into(),
            instruction_prompt: instruction_prompt.into(),
            target_schema,
            requesting_user_id: requesting_user_id.into(),
            file_type_category,
            overrides: RoutingOverrides::default(),
            on_progress: None,
        }
    }

    /// Sets routing overrides.
    #[must_use]
    pub fn with_overrides(mut self, overrides: RoutingOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Sets the per-attempt progress callback.
    #[must_use]
    pub fn with_progress(mut self, on_progress: ProgressFn) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    fn report_progress(&self, message: &str, fraction: f32) {
        if let Some(callback) = &self.on_progress {
            // A failing observer must not fail the extraction.
            if std::panic::catch_unwind(AssertUnwindSafe(|| callback(message, fraction))).is_err() {
                tracing::warn!(event = "progress_callback_panicked", "progress_callback_panicked");
            }
        }
    }
}

impl fmt::Debug for ExtractionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionRequest")
            .field("media_type", &self.media_type)
            .field("content_len", &self.content_base64.len())
            .field("requesting_user_id", &self.requesting_user_id)
            .field("file_type_category", &self.file_type_category)
            .field("has_progress", &self.on_progress.is_some())
            .finish_non_exhaustive()
    }
}

/// A successful guarded extraction.
#[derive(Debug, Clone)]
pub struct GuardedExtraction {
    /// The schema-valid object.
    pub value: Value,
    /// Metrics of the successful attempt.
    pub metrics: ExtractionMetrics,
    /// Attempts made, including the successful one.
    pub attempts: u32,
    /// Model that produced the object.
    pub model_id: String,
    /// Credits consumed.
    pub credit_cost: u32,
}

/// Wraps an [`ExtractionCore`] with credit admission, retry, fallback, and refund.
///
/// Per call the ledger sees exactly one check and one consumption, and one
/// refund when every attempt fails. Configuration is resolved per call and
/// never cached.
#[derive(Clone)]
pub struct GuardedExtractor {
    core: ExtractionCore,
    ledger: Arc<dyn CreditLedger>,
    config_source: Arc<dyn ConfigSource>,
    feature_key: String,
}

impl GuardedExtractor {
    /// Creates an extractor billing against `feature_key`.
    #[must_use]
    pub fn new(
        core: ExtractionCore,
        ledger: Arc<dyn CreditLedger>,
        config_source: Arc<dyn ConfigSource>,
        feature_key: impl Into<String>,
    ) -> Self {
        Self {
            core,
            ledger,
            config_source,
            feature_key: feature_key.into(),
        }
    }

    /// Returns the feature key used to resolve configuration.
    #[must_use]
    pub fn feature_key(&self) -> &str {
        &self.feature_key
    }

    /// Returns a copy of this extractor billing against another feature.
    #[must_use]
    pub fn for_feature(&self, feature_key: impl Into<String>) -> Self {
        Self {
            feature_key: feature_key.into(),
            ..self.clone()
        }
    }

    /// Runs the extraction under credit metering with retry and fallback.
    ///
    /// # Errors
    ///
    /// - [`GuardError::Config`] before any credit call if routing is incomplete
    ///   or the target schema does not compile.
    /// - [`GuardError::InsufficientCredits`] before any consumption.
    /// - [`GuardError::Ledger`] if the check or consumption fails.
    /// - [`GuardError::Exhausted`] after `max_retries + 1` failed attempts; the
    ///   credits have been refunded.
    pub async fn guarded_extract(
        &self,
        request: &ExtractionRequest,
    ) -> Result<GuardedExtraction, GuardError> {
        let category = request.file_type_category;
        let feature = self.config_source.get_config(&self.feature_key).await?;
        let routing =
            ModelRoutingConfig::resolve(&self.feature_key, &feature, category, &request.overrides)?;
        let schema = CompiledSchema::compile(&request.target_schema).map_err(|e| match e {
            ExtractionError::SchemaError(message) => ConfigError::InvalidSchema(message),
            other => ConfigError::InvalidSchema(other.to_string()),
        })?;
        let user_id = request.requesting_user_id.as_str();

        if !self.ledger.check_credits(user_id, routing.credit_cost).await? {
            tracing::info!(
                event = "insufficient_credits",
                user_id,
                required = routing.credit_cost,
                "insufficient_credits"
            );
            return Err(GuardError::InsufficientCredits {
                user_id: user_id.to_string(),
                required: routing.credit_cost,
            });
        }

        self.ledger
            .consume_credits(CreditConsumption {
                user_id: user_id.to_string(),
                amount: routing.credit_cost,
                kind: CONSUMPTION_KIND.to_string(),
                description: format!("AI import ({category})"),
                metadata: json!({
                    "feature": self.feature_key,
                    "file_type": category.as_str(),
                    "model": routing.primary_model_id,
                    "fallback_model": routing.fallback_model_id,
                }),
            })
            .await?;

        tracing::debug!(
            event = "credits_consumed",
            user_id,
            amount = routing.credit_cost,
            "credits_consumed"
        );

        match self.run_attempts(&routing, &schema, request).await {
            Ok(extraction) => Ok(extraction),
            Err((history, last)) => {
                self.refund(user_id, category, routing.credit_cost).await;
                Err(GuardError::Exhausted {
                    attempts: u32::try_from(history.len()).unwrap_or(u32::MAX),
                    history,
                    last,
                })
            }
        }
    }

    async fn run_attempts(
        &self,
        routing: &ModelRoutingConfig,
        schema: &CompiledSchema,
        request: &ExtractionRequest,
    ) -> Result<GuardedExtraction, (Vec<AttemptRecord>, ExtractionError)> {
        let total = routing.max_retries.saturating_add(1);
        let mode = request.file_type_category.extraction_mode();
        let input = ExtractionInput {
            content_base64: &request.content_base64,
            media_type: &request.media_type,
            prompt: &request.instruction_prompt,
            schema,
        };
        let start = Instant::now();
        let mut history = Vec::new();
        let mut state = RetryState::new(routing.primary_model_id.clone());

        loop {
            let attempt_number = state.attempt + 1;
            request.report_progress(
                &format!("Analyzing with AI (attempt {attempt_number}/{total})"),
                attempt_progress(state.attempt, total),
            );

            let model = ModelSelection::new(state.current_model.clone())
                .with_api_key(routing.api_key.clone());

            let err = match self.core.extract(mode, &model, input).await {
                Ok((value, metrics)) => {
                    tracing::info!(
                        event = "extraction_succeeded",
                        attempt = attempt_number,
                        model = %state.current_model,
                        path = metrics.path.as_str(),
                        "extraction_succeeded"
                    );
                    return Ok(GuardedExtraction {
                        value,
                        metrics,
                        attempts: attempt_number,
                        model_id: state.current_model,
                        credit_cost: routing.credit_cost,
                    });
                }
                Err(err) => err,
            };

            tracing::warn!(
                event = "attempt_failed",
                attempt = attempt_number,
                max_attempts = total,
                model = %state.current_model,
                error = %err,
                "attempt_failed"
            );
            history.push(AttemptRecord {
                attempt_number,
                model_id: state.current_model.clone(),
                error: err.to_string(),
                elapsed: start.elapsed(),
            });

            if attempt_number >= total {
                return Err((history, err));
            }

            let failed_attempt = state.attempt;
            let was_switched = state.switched_to_fallback;
            state = state.after_failure(&routing.fallback_model_id);
            if state.switched_to_fallback && !was_switched {
                tracing::info!(
                    event = "model_fallback",
                    from = %routing.primary_model_id,
                    to = %state.current_model,
                    "model_fallback"
                );
            }

            let delay = backoff_delay(routing.retry_delay_base_ms, failed_attempt);
            tracing::debug!(
                event = "retry_backoff",
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "retry_backoff"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn refund(&self, user_id: &str, category: FileCategory, amount: u32) {
        let grant = CreditGrant {
            user_id: user_id.to_string(),
            amount,
            kind: REFUND_KIND.to_string(),
            description: format!("Refund: AI import failed ({category})"),
        };
        match self.ledger.add_credits(grant).await {
            Ok(()) => tracing::info!(event = "credits_refunded", user_id, amount, "credits_refunded"),
            Err(e) => tracing::error!(
                event = "refund_failed",
                user_id,
                amount,
                error = %e,
                "refund_failed"
            ),
        }
    }
}
