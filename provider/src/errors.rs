use docimport_extract::extraction::ExtractionError;
use thiserror::Error;

/// Errors relating to the Rig provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The completion call itself failed.
    #[error("Completion error: {0}")]
    Completion(#[from] rig::completion::CompletionError),

    /// A request carried an API key but no keyed client factory is set.
    #[error("API key override requires a keyed client factory")]
    KeyedClientUnavailable,

    /// The user message could not be assembled.
    #[error("Message error: {0}")]
    Message(String),
}

impl From<ProviderError> for ExtractionError {
    fn from(err: ProviderError) -> Self {
        Self::Generation(err.to_string())
    }
}
