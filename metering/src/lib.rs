//! Credit metering and resilience for AI document extraction.
//!
//! [`GuardedExtractor`] is the only entry point domain code should call: it
//! resolves per-category routing, checks and consumes credits up front, runs
//! the extraction core with exponential backoff and a one-time switch to a
//! fallback model, and refunds the credits if every attempt fails.

pub mod error;
pub mod guard;
pub mod ledger;
pub mod retry;
pub mod routing;

pub use error::{AttemptRecord, ConfigError, GuardError, LedgerError};
pub use guard::{ExtractionRequest, GuardedExtraction, GuardedExtractor, ProgressFn};
pub use ledger::{CreditConsumption, CreditGrant, CreditLedger, InMemoryLedger, LedgerEntry};
pub use routing::{
    ConfigSource, CreditCosts, FeatureModelConfig, FileCategory, ModelRoutingConfig,
    RoutingOverrides, StaticConfigSource,
};
