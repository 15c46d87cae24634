//! Configuration for a single extraction attempt.

use std::time::Duration;

/// Number of decoded characters forwarded to the model on the text path.
pub const TEXT_CHAR_LIMIT: usize = 50_000;

/// Upper bound on a single structured-generation call.
pub const GENERATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Configuration for extraction attempts.
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Maximum characters of decoded text sent on the text path (default: 50,000).
    ///
    /// Truncation is character based; no token counting is performed, so a
    /// clipped document may be cut mid-word.
    pub text_char_limit: usize,
    /// Timeout applied to every structured-generation call (default: 120 seconds).
    pub timeout: Duration,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            text_char_limit: TEXT_CHAR_LIMIT,
            timeout: GENERATION_TIMEOUT,
        }
    }
}

impl ExtractionConfig {
    /// Set the character limit for the text path.
    #[must_use]
    pub const fn with_text_char_limit(mut self, limit: usize) -> Self {
        self.text_char_limit = limit;
        self
    }

    /// Set the timeout for each structured-generation call.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
