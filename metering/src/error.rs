//! Error types for routing configuration, the credit ledger, and guarded extraction.

use docimport_extract::extraction::ExtractionError;
use std::time::Duration;
use thiserror::Error;

use crate::routing::FileCategory;

/// Configuration problems detected before any credit or network call.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration source has no entry for the feature.
    #[error("No AI model configuration for feature '{0}'")]
    UnknownFeature(String),

    /// No model is configured for the file category.
    #[error("No AI model configured for {category} files (feature '{feature}')")]
    MissingModel {
        /// Feature key that was resolved.
        feature: String,
        /// File category that has no model.
        category: FileCategory,
    },

    /// No fallback model is configured.
    #[error("No fallback AI model configured (feature '{feature}')")]
    MissingFallbackModel {
        /// Feature key that was resolved.
        feature: String,
    },

    /// No credit cost is configured for the file category.
    #[error("No credit cost configured for {category} files (feature '{feature}')")]
    MissingCreditCost {
        /// Feature key that was resolved.
        feature: String,
        /// File category that has no cost.
        category: FileCategory,
    },

    /// The target schema does not compile.
    #[error("Invalid target schema: {0}")]
    InvalidSchema(String),

    /// The configuration document could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Errors reported by a credit ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The ledger could not be reached.
    #[error("Credit ledger unavailable: {0}")]
    Unavailable(String),

    /// The ledger refused the operation.
    #[error("Credit ledger rejected the operation: {0}")]
    Rejected(String),
}

/// Record of a single failed extraction attempt.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    /// The attempt number (1-indexed).
    pub attempt_number: u32,
    /// Model identifier used for this attempt.
    pub model_id: String,
    /// Error message of this attempt.
    pub error: String,
    /// Elapsed time since the first attempt started.
    pub elapsed: Duration,
}

/// Errors from [`GuardedExtractor::guarded_extract`](crate::GuardedExtractor::guarded_extract).
#[derive(Debug, Error)]
pub enum GuardError {
    /// Routing configuration is incomplete; no credits were touched.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The user cannot afford the extraction; no credits were consumed.
    #[error("Insufficient credits: {required} required")]
    InsufficientCredits {
        /// User that was checked.
        user_id: String,
        /// Credits the extraction costs.
        required: u32,
    },

    /// The ledger failed during the check or the consumption.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Every attempt failed; the credits were refunded.
    ///
    /// Displays as the last recorded extraction error.
    #[error("{last}")]
    Exhausted {
        /// Number of attempts made.
        attempts: u32,
        /// History of all attempts.
        history: Vec<AttemptRecord>,
        /// The last recorded extraction error.
        #[source]
        last: ExtractionError,
    },
}
