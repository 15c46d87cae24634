#![deny(missing_docs)]
//! Rig-backed [`StructuredGenerator`](docimport_extract::generator::StructuredGenerator).
//!
//! [`RigGenerator`] drives any Rig `CompletionClient`: the target schema goes
//! into the preamble, inline payloads become image or document content, and
//! the reply text is parsed back into JSON for the extraction core to validate.

/// Error types for the provider.
pub mod errors;
/// The generator implementation.
pub mod generator;
/// Message building and reply helpers.
pub mod utils;

pub use errors::ProviderError;
pub use generator::{KeyedClientFactory, RigGenerator};
