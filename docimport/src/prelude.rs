//! Common imports for docimport usage.
//!
//! ```
//! use docimport::prelude::*;
//! ```

// Workflow surface
pub use crate::config::ImportLimits;
pub use crate::errors::ImportError;
pub use crate::progress::{ImportProgressEvent, ImportStep, ProgressSender, progress_channel};
pub use crate::router::{ContentHandler, ContentRouter, RouteSlot, RouterError};
pub use crate::types::{
    ImportFile, ImportMode, ImportOptions, ImportResult, PersistOutcome, SheetSelector,
};
pub use crate::workflow::{ImportDomain, ImportWorkflow};

// Extraction and metering
pub use docimport_extract::prelude::*;
pub use docimport_metering::{
    ConfigSource, CreditLedger, FileCategory, GuardError, GuardedExtractor, InMemoryLedger,
    StaticConfigSource,
};

// Rig-backed generator
pub use docimport_provider::RigGenerator;
pub use rig::client::CompletionClient;
