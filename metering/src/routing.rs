//! Per-feature model routing configuration.
//!
//! A configuration source returns one [`FeatureModelConfig`] per feature key.
//! [`ModelRoutingConfig::resolve`] narrows it to the single file category of a
//! request, once, before any credit or network call.

use async_trait::async_trait;
use docimport_extract::extraction::ExtractionMode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::ConfigError;

/// Retries after the first attempt when the feature does not say otherwise.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Base backoff delay when the feature does not say otherwise.
pub const DEFAULT_RETRY_DELAY_BASE_MS: u64 = 1_000;

/// File-type category used to pick a model and a credit cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    /// Photos and screenshots.
    Image,
    /// PDF documents.
    Pdf,
    /// Word processor and plain-text documents.
    Document,
    /// CSV and spreadsheet workbooks.
    Spreadsheet,
}

impl FileCategory {
    /// Returns the lowercase name used in configuration and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Pdf => "pdf",
            Self::Document => "document",
            Self::Spreadsheet => "spreadsheet",
        }
    }

    /// Path the extraction core starts on for this category.
    ///
    /// Images and PDFs go straight to the vision path; documents and
    /// spreadsheets are decoded as text first.
    #[must_use]
    pub const fn extraction_mode(self) -> ExtractionMode {
        match self {
            Self::Image | Self::Pdf => ExtractionMode::Vision,
            Self::Document | Self::Spreadsheet => ExtractionMode::Text,
        }
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credit cost per file category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreditCosts {
    /// Cost of an image extraction.
    pub image: Option<u32>,
    /// Cost of a PDF extraction.
    pub pdf: Option<u32>,
    /// Cost of a document extraction.
    pub document: Option<u32>,
    /// Cost of a spreadsheet extraction.
    pub spreadsheet: Option<u32>,
}

impl CreditCosts {
    /// Returns the configured cost for `category`.
    #[must_use]
    pub const fn for_category(&self, category: FileCategory) -> Option<u32> {
        match category {
            FileCategory::Image => self.image,
            FileCategory::Pdf => self.pdf,
            FileCategory::Document => self.document,
            FileCategory::Spreadsheet => self.spreadsheet,
        }
    }
}

/// Routing record for one feature, as returned by a [`ConfigSource`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureModelConfig {
    /// Model for images.
    pub image_model: Option<String>,
    /// Model for PDFs.
    pub pdf_model: Option<String>,
    /// Model for documents.
    pub document_model: Option<String>,
    /// Model for spreadsheets.
    pub spreadsheet_model: Option<String>,
    /// Model used after the first failed attempt.
    pub fallback_model: Option<String>,
    /// Credit cost per category.
    pub credit_costs: CreditCosts,
    /// Retries after the first attempt (default: 2).
    pub max_retries: Option<u32>,
    /// Base backoff delay in milliseconds (default: 1000).
    pub retry_delay_base_ms: Option<u64>,
    /// API key passed to the provider.
    pub api_key: Option<String>,
}

impl FeatureModelConfig {
    /// Returns the configured model for `category`, ignoring blank entries.
    #[must_use]
    pub fn model_for(&self, category: FileCategory) -> Option<&str> {
        let model = match category {
            FileCategory::Image => &self.image_model,
            FileCategory::Pdf => &self.pdf_model,
            FileCategory::Document => &self.document_model,
            FileCategory::Spreadsheet => &self.spreadsheet_model,
        };
        non_blank(model.as_deref())
    }
}

/// Per-request values that take precedence over the feature configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingOverrides {
    /// Replaces the category's credit cost.
    pub credit_cost: Option<u32>,
    /// Replaces the category's primary model.
    pub model_id: Option<String>,
    /// Replaces the feature's API key.
    pub api_key: Option<String>,
}

/// Routing resolved for one request; fixed for the whole retry loop.
#[derive(Clone, PartialEq, Eq)]
pub struct ModelRoutingConfig {
    /// Model for the first attempt.
    pub primary_model_id: String,
    /// Model for attempts after the first failure.
    pub fallback_model_id: String,
    /// API key passed to the provider.
    pub api_key: Option<String>,
    /// Credits consumed up front and refunded on total failure.
    pub credit_cost: u32,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Base backoff delay in milliseconds.
    pub retry_delay_base_ms: u64,
}

impl ModelRoutingConfig {
    /// Narrows `config` to `category`, applying `overrides`.
    ///
    /// # Errors
    ///
    /// Returns a distinct [`ConfigError`] for a missing model, a missing
    /// fallback model, and a missing credit cost.
    pub fn resolve(
        feature: &str,
        config: &FeatureModelConfig,
        category: FileCategory,
        overrides: &RoutingOverrides,
    ) -> Result<Self, ConfigError> {
        let primary_model_id = non_blank(overrides.model_id.as_deref())
            .or_else(|| config.model_for(category))
            .ok_or_else(|| ConfigError::MissingModel {
                feature: feature.to_string(),
                category,
            })?
            .to_string();

        let fallback_model_id = non_blank(config.fallback_model.as_deref())
            .ok_or_else(|| ConfigError::MissingFallbackModel {
                feature: feature.to_string(),
            })?
            .to_string();

        let credit_cost = overrides
            .credit_cost
            .or_else(|| config.credit_costs.for_category(category))
            .ok_or_else(|| ConfigError::MissingCreditCost {
                feature: feature.to_string(),
                category,
            })?;

        Ok(Self {
            primary_model_id,
            fallback_model_id,
            api_key: overrides.api_key.clone().or_else(|| config.api_key.clone()),
            credit_cost,
            max_retries: config.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            retry_delay_base_ms: config
                .retry_delay_base_ms
                .unwrap_or(DEFAULT_RETRY_DELAY_BASE_MS),
        })
    }
}

impl fmt::Debug for ModelRoutingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRoutingConfig")
            .field("primary_model_id", &self.primary_model_id)
            .field("fallback_model_id", &self.fallback_model_id)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("credit_cost", &self.credit_cost)
            .field("max_retries", &self.max_retries)
            .field("retry_delay_base_ms", &self.retry_delay_base_ms)
            .finish()
    }
}

/// External source of per-feature routing configuration.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Returns the routing record for `feature_key`.
    async fn get_config(&self, feature_key: &str) -> Result<FeatureModelConfig, ConfigError>;
}

/// A [`ConfigSource`] backed by an in-process map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticConfigSource {
    /// Routing records keyed by feature.
    #[serde(default)]
    pub features: HashMap<String, FeatureModelConfig>,
}

impl StaticConfigSource {
    /// Returns an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the record for `feature_key`.
    #[must_use]
    pub fn with_feature(mut self, feature_key: impl Into<String>, config: FeatureModelConfig) -> Self {
        self.features.insert(feature_key.into(), config);
        self
    }

    /// Load configuration from a TOML string with one `[features.<key>]` table per feature.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` if the document is not valid TOML or has the wrong shape.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[async_trait]
impl ConfigSource for StaticConfigSource {
    async fn get_config(&self, feature_key: &str) -> Result<FeatureModelConfig, ConfigError> {
        self.features
            .get(feature_key)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownFeature(feature_key.to_string()))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_config() -> FeatureModelConfig {
        FeatureModelConfig {
            image_model: Some("vision-large".into()),
            pdf_model: Some("vision-large".into()),
            document_model: Some("text-large".into()),
            spreadsheet_model: Some("text-large".into()),
            fallback_model: Some("generalist".into()),
            credit_costs: CreditCosts {
                image: Some(2),
                pdf: Some(3),
                document: Some(1),
                spreadsheet: Some(1),
            },
            max_retries: None,
            retry_delay_base_ms: None,
            api_key: Some("sk-feature".into()),
        }
    }

    #[test]
    fn test_resolve_uses_category_and_defaults() {
        let routing = ModelRoutingConfig::resolve(
            "nutrition_import",
            &full_config(),
            FileCategory::Pdf,
            &RoutingOverrides::default(),
        )
        .unwrap();

        assert_eq!(routing.primary_model_id, "vision-large");
        assert_eq!(routing.fallback_model_id, "generalist");
        assert_eq!(routing.credit_cost, 3);
        assert_eq!(routing.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(routing.retry_delay_base_ms, DEFAULT_RETRY_DELAY_BASE_MS);
        assert_eq!(routing.api_key.as_deref(), Some("sk-feature"));
    }

    #[test]
    fn test_resolve_applies_overrides() {
        let overrides = RoutingOverrides {
            credit_cost: Some(0),
            model_id: Some("custom".into()),
            api_key: Some("sk-user".into()),
        };
        let routing = ModelRoutingConfig::resolve(
            "nutrition_import",
            &full_config(),
            FileCategory::Image,
            &overrides,
        )
        .unwrap();

        assert_eq!(routing.primary_model_id, "custom");
        assert_eq!(routing.credit_cost, 0);
        assert_eq!(routing.api_key.as_deref(), Some("sk-user"));
    }

    #[test]
    fn test_resolve_distinct_errors() {
        let mut config = full_config();
        config.spreadsheet_model = Some("  ".into());
        let err = ModelRoutingConfig::resolve(
            "f",
            &config,
            FileCategory::Spreadsheet,
            &RoutingOverrides::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingModel { category: FileCategory::Spreadsheet, .. }
        ));

        let mut config = full_config();
        config.fallback_model = None;
        let err = ModelRoutingConfig::resolve(
            "f",
            &config,
            FileCategory::Image,
            &RoutingOverrides::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingFallbackModel { .. }));

        let mut config = full_config();
        config.credit_costs.document = None;
        let err = ModelRoutingConfig::resolve(
            "f",
            &config,
            FileCategory::Document,
            &RoutingOverrides::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingCreditCost { category: FileCategory::Document, .. }
        ));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let routing = ModelRoutingConfig::resolve(
            "f",
            &full_config(),
            FileCategory::Image,
            &RoutingOverrides::default(),
        )
        .unwrap();
        assert!(!format!("{routing:?}").contains("sk-feature"));
    }

    #[test]
    fn test_category_modes() {
        assert_eq!(FileCategory::Image.extraction_mode(), ExtractionMode::Vision);
        assert_eq!(FileCategory::Pdf.extraction_mode(), ExtractionMode::Vision);
        assert_eq!(FileCategory::Document.extraction_mode(), ExtractionMode::Text);
        assert_eq!(FileCategory::Spreadsheet.extraction_mode(), ExtractionMode::Text);
    }

    #[tokio::test]
    async fn test_static_source_from_toml() {
        let source = StaticConfigSource::from_toml(
            r#"
            [features.workout_import]
            image_model = "vision-large"
            fallback_model = "generalist"
            max_retries = 1
            retry_delay_base_ms = 250

            [features.workout_import.credit_costs]
            image = 2
            "#,
        )
        .unwrap();

        let config = source.get_config("workout_import").await.unwrap();
        assert_eq!(config.image_model.as_deref(), Some("vision-large"));
        assert_eq!(config.credit_costs.image, Some(2));
        assert_eq!(config.credit_costs.pdf, None);
        assert_eq!(config.max_retries, Some(1));

        assert!(matches!(
            source.get_config("agenda_import").await,
            Err(ConfigError::UnknownFeature(_))
        ));
    }

    #[test]
    fn test_from_toml_rejects_garbage() {
        assert!(matches!(
            StaticConfigSource::from_toml("features = 3"),
            Err(ConfigError::Parse(_))
        ));
    }
}
