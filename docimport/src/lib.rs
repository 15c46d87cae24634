//! # docimport
//!
//! AI-assisted document import: route a user file by media type, extract a
//! schema-valid object from it with credit metering, retries, and a fallback
//! model, then hand the object to domain code for matching and persistence.
//!
//! ## Example
//!
//! ```no_run
//! # use docimport::prelude::*;
//! # use std::sync::Arc;
//! # async fn example<D: ImportDomain>(domain: D, generator: Arc<dyn StructuredGenerator>) {
//! let config = StaticConfigSource::from_toml(r#"
//!     [features.measurement_import]
//!     image_model = "vision-large"
//!     pdf_model = "vision-large"
//!     document_model = "text-large"
//!     spreadsheet_model = "text-large"
//!     fallback_model = "vision-small"
//!     credit_costs = { image = 2, pdf = 3, document = 1, spreadsheet = 1 }
//! "#).unwrap();
//!
//! let extractor = GuardedExtractor::new(
//!     ExtractionCore::new(generator),
//!     Arc::new(InMemoryLedger::with_balance("user1", 10)),
//!     Arc::new(config),
//!     "measurement_import",
//! );
//!
//! let (progress, events) = progress_channel();
//! let workflow = ImportWorkflow::new(domain, &extractor).with_progress(progress);
//!
//! let files = [ImportFile::new("scan.pdf", "JVBERi0xLjQ=").with_media_type("application/pdf")];
//! let result = workflow.import(&files, "user1", &ImportOptions::default()).await;
//! # let _ = (result, events);
//! # }
//! ```

#![deny(missing_docs)]

/// Import limits.
pub mod config;

/// Public error types.
pub mod errors;

/// Progress events and channel.
pub mod progress;

/// Media-type routing.
pub mod router;

/// Request and result types.
pub mod types;

/// The import workflow.
pub mod workflow;

/// Commonly used types and traits.
pub mod prelude;
