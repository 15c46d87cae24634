//! Metrics tracking and token estimation for extraction attempts.

use std::time::Duration;

/// Which code path produced an extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractionPath {
    /// Decoded text was sent inside a fenced block.
    #[default]
    Text,
    /// The payload was sent as an inline data reference.
    Vision,
    /// The text path could not use the payload and handed it to the vision path.
    VisionRerouted,
}

impl ExtractionPath {
    /// Returns a stable lowercase name for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Vision => "vision",
            Self::VisionRerouted => "vision_rerouted",
        }
    }
}

/// Metrics collected during a single extraction attempt.
#[derive(Debug, Clone, Default)]
pub struct ExtractionMetrics {
    /// Path that produced the object.
    pub path: ExtractionPath,
    /// Whether decoded text was clipped at the character limit.
    pub truncated: bool,
    /// Wall-clock time elapsed during the attempt.
    pub wall_time: Duration,
    /// Estimated input tokens sent to the model.
    pub estimated_input_tokens: usize,
    /// Estimated output tokens received from the model.
    pub estimated_output_tokens: usize,
}

/// Estimate token count from text using the standard 4-chars-per-token heuristic.
///
/// Uses `chars().count()` to handle UTF-8 correctly (not `len()` which counts bytes).
/// Returns ceiling division to avoid underestimation.
///
/// # Examples
///
/// ```
/// use docimport_extract::extraction::estimate_tokens;
///
/// assert_eq!(estimate_tokens("hello"), 2);  // 5 chars / 4 = 1.25 -> 2
/// assert_eq!(estimate_tokens("hello world"), 3);  // 11 chars / 4 = 2.75 -> 3
/// ```
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}
