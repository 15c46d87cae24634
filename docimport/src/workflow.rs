//! The import workflow: validate, parse, process, persist.
//!
//! A domain plugs in through [`ImportDomain`]; [`ImportWorkflow`] owns the
//! fixed step order, progress reporting, and error shaping. `import` never
//! fails: every error becomes an [`ImportResult`] with `success: false`.

use async_trait::async_trait;
use docimport_extract::extraction::schema_for;
use docimport_metering::{ExtractionRequest, FileCategory, GuardedExtractor, ProgressFn};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::ImportLimits;
use crate::errors::ImportError;
use crate::progress::{ImportProgressEvent, ImportStep, ProgressSender};
use crate::router::ContentRouter;
use crate::types::{ImportFile, ImportOptions, ImportResult, PersistOutcome};

/// The domain-specific half of an import.
///
/// Implementors describe what to extract and what to do with it; they never
/// see credits, retries, or progress.
#[async_trait]
pub trait ImportDomain: Send + Sync {
    /// Shape the model is asked to produce.
    type Parsed: DeserializeOwned + JsonSchema + Send;
    /// Output of [`ImportDomain::process_parsed`].
    type Processed: Send;
    /// Domain fields merged into the [`ImportResult`].
    type Details: Send;

    /// Key used to resolve model routing and credit costs.
    fn feature_key(&self) -> &str;

    /// JSON Schema sent with the extraction. Defaults to the schema of
    /// [`ImportDomain::Parsed`].
    fn target_schema(&self) -> Value {
        schema_for::<Self::Parsed>()
    }

    /// Which media types the domain accepts.
    fn router(&self) -> ContentRouter<FileCategory> {
        ContentRouter::by_category()
    }

    /// Instruction prompt for the model.
    fn build_prompt(&self, options: &ImportOptions) -> String;

    /// Normalizes the extracted object and matches it against existing records.
    async fn process_parsed(
        &self,
        parsed: Self::Parsed,
        user_id: &str,
        options: &ImportOptions,
    ) -> anyhow::Result<Self::Processed>;

    /// Stores the processed value.
    async fn persist(
        &self,
        processed: Self::Processed,
        user_id: &str,
    ) -> anyhow::Result<PersistOutcome<Self::Details>>;

    /// Domain fields for a failed result.
    fn create_error_result(&self, errors: &[String]) -> Self::Details;
}

/// Runs imports for one domain.
pub struct ImportWorkflow<D> {
    domain: D,
    extractor: GuardedExtractor,
    limits: ImportLimits,
    progress: Option<ProgressSender>,
}

impl<D: ImportDomain> ImportWorkflow<D> {
    /// Creates a workflow billing against the domain's feature key.
    #[must_use]
    pub fn new(domain: D, extractor: &GuardedExtractor) -> Self {
        let extractor = extractor.for_feature(domain.feature_key());
        Self {
            domain,
            extractor,
            limits: ImportLimits::default(),
            progress: None,
        }
    }

    /// Sets request limits.
    #[must_use]
    pub const fn with_limits(mut self, limits: ImportLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Sets the progress sink.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressSender) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Returns the domain.
    #[must_use]
    pub const fn domain(&self) -> &D {
        &self.domain
    }

    /// Imports `files` for `user_id`.
    ///
    /// Only the first file is parsed; further files are counted in a warning
    /// and never read.
    pub async fn import(
        &self,
        files: &[ImportFile],
        user_id: &str,
        options: &ImportOptions,
    ) -> ImportResult<D::Details> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "import",
            %request_id,
            user_id,
            feature = self.domain.feature_key()
        );

        async {
            tracing::info!(event = "import_started", files = files.len(), "import_started");
            match self.run(files, user_id, options).await {
                Ok(result) => {
                    tracing::info!(
                        event = "import_completed",
                        warnings = result.warnings.len(),
                        "import_completed"
                    );
                    result
                }
                Err(err) => {
                    tracing::error!(
                        event = "import_failed",
                        %request_id,
                        user_id,
                        error = %err,
                        "import_failed"
                    );
                    let errors = vec![err.to_string()];
                    self.emit(ImportProgressEvent::new(ImportStep::Error, err.to_string()));
                    ImportResult::failed(self.domain.create_error_result(&errors), errors)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        files: &[ImportFile],
        user_id: &str,
        options: &ImportOptions,
    ) -> Result<ImportResult<D::Details>, ImportError> {
        self.emit(ImportProgressEvent::new(ImportStep::Validating, "Validating files"));
        self.limits.validate(files)?;
        let file = files.first().ok_or(ImportError::NoFiles)?;

        let mut warnings = Vec::new();
        if files.len() > 1 {
            let ignored = files.len() - 1;
            tracing::warn!(event = "extra_files_ignored", ignored, "extra_files_ignored");
            warnings.push(format!(
                "Only the first file was imported; {ignored} additional file(s) were ignored"
            ));
        }

        self.emit(
            ImportProgressEvent::new(ImportStep::Parsing, format!("Reading {}", file.name))
                .with_metadata(json!({ "file": file.name })),
        );
        let parsed = self.parse(file, user_id, options, &mut warnings).await?;

        self.emit(ImportProgressEvent::new(ImportStep::Matching, "Matching records"));
        let processed = self.domain.process_parsed(parsed, user_id, options).await?;

        self.emit(ImportProgressEvent::new(ImportStep::Persisting, "Saving"));
        let outcome = self.domain.persist(processed, user_id).await?;
        warnings.extend(outcome.warnings);

        self.emit(ImportProgressEvent::new(ImportStep::Completed, "Import complete"));
        Ok(ImportResult::succeeded(outcome.details, warnings))
    }

    async fn parse(
        &self,
        file: &ImportFile,
        user_id: &str,
        options: &ImportOptions,
        warnings: &mut Vec<String>,
    ) -> Result<D::Parsed, ImportError> {
        let media_type = file.resolved_media_type();
        let category = self.domain.router().category(&media_type)?;

        let mut prompt = self.domain.build_prompt(options);
        if let (FileCategory::Spreadsheet, Some(sheet)) = (category, &file.sheet) {
            prompt.push_str("\n\n");
            prompt.push_str(&sheet.prompt_hint());
        }

        let mut request = ExtractionRequest::new(
            file.content.as_str(),
            media_type.as_str(),
            prompt,
            self.domain.target_schema(),
            user_id,
            category,
        );
        if let Some(progress) = self.progress.clone() {
            request = request.with_progress(attempt_progress(progress));
        }

        let extraction = self.extractor.guarded_extract(&request).await?;
        if extraction.metrics.truncated {
            warnings.push(
                "The document was too long and only its beginning was analyzed".to_string(),
            );
        }

        Ok(serde_json::from_value(extraction.value)?)
    }

    fn emit(&self, event: ImportProgressEvent) {
        if let Some(progress) = &self.progress {
            progress.send(event);
        }
    }
}

/// Forwards per-attempt extraction progress as parsing events.
fn attempt_progress(progress: ProgressSender) -> ProgressFn {
    Arc::new(move |message: &str, fraction: f32| {
        progress.send(
            ImportProgressEvent::new(ImportStep::Parsing, message).with_progress(fraction),
        );
    })
}
