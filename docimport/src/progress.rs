//! Import progress events and the channel they travel on.
//!
//! Events are fire-and-forget: a dropped receiver or a panicking callback
//! never fails an import.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Number of numbered steps in an import.
pub const TOTAL_STEPS: u32 = 5;

/// Stage of an import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStep {
    /// Checking file count and sizes.
    Validating,
    /// Routing and AI extraction.
    Parsing,
    /// Domain normalization and matching.
    Matching,
    /// Domain persistence.
    Persisting,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Error,
}

impl ImportStep {
    /// Progress fraction at the start of this step.
    #[must_use]
    pub const fn progress(self) -> f32 {
        match self {
            Self::Validating => 0.1,
            Self::Parsing => 0.25,
            Self::Matching => 0.5,
            Self::Persisting => 0.75,
            Self::Completed => 1.0,
            Self::Error => 0.0,
        }
    }

    /// One-based step number; `None` for [`ImportStep::Error`].
    #[must_use]
    pub const fn step_number(self) -> Option<u32> {
        match self {
            Self::Validating => Some(1),
            Self::Parsing => Some(2),
            Self::Matching => Some(3),
            Self::Persisting => Some(4),
            Self::Completed => Some(5),
            Self::Error => None,
        }
    }
}

/// One progress notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportProgressEvent {
    /// Stage.
    pub step: ImportStep,
    /// Human-readable message.
    pub message: String,
    /// Fraction in `[0, 1]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f32>,
    /// One-based step number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_number: Option<u32>,
    /// Total number of steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_steps: Option<u32>,
    /// Free-form context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl ImportProgressEvent {
    /// An event at the start of `step`.
    #[must_use]
    pub fn new(step: ImportStep, message: impl Into<String>) -> Self {
        let step_number = step.step_number();
        Self {
            step,
            message: message.into(),
            progress: Some(step.progress()),
            step_number,
            total_steps: step_number.map(|_| TOTAL_STEPS),
            metadata: None,
        }
    }

    /// Overrides the progress fraction.
    #[must_use]
    pub fn with_progress(mut self, progress: f32) -> Self {
        self.progress = Some(progress.clamp(0.0, 1.0));
        self
    }

    /// Attaches metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

type ProgressCallback = Arc<dyn Fn(&ImportProgressEvent) + Send + Sync>;

#[derive(Clone)]
enum Sink {
    Channel(mpsc::UnboundedSender<ImportProgressEvent>),
    Callback(ProgressCallback),
}

/// Where the workflow emits progress. Cheap to clone and safe to share
/// across concurrent imports.
#[derive(Clone)]
pub struct ProgressSender {
    sink: Sink,
}

impl ProgressSender {
    /// A sender that calls `callback` synchronously for each event.
    #[must_use]
    pub fn from_fn(callback: impl Fn(&ImportProgressEvent) + Send + Sync + 'static) -> Self {
        Self {
            sink: Sink::Callback(Arc::new(callback)),
        }
    }

    /// Delivers an event. Never fails.
    pub fn send(&self, event: ImportProgressEvent) {
        match &self.sink {
            Sink::Channel(tx) => {
                if tx.send(event).is_err() {
                    tracing::trace!(event = "progress_receiver_dropped", "progress_receiver_dropped");
                }
            }
            Sink::Callback(callback) => {
                if std::panic::catch_unwind(AssertUnwindSafe(|| callback(&event))).is_err() {
                    tracing::warn!(event = "progress_callback_panicked", "progress_callback_panicked");
                }
            }
        }
    }
}

impl fmt::Debug for ProgressSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.sink {
            Sink::Channel(_) => "channel",
            Sink::Callback(_) => "callback",
        };
        f.debug_struct("ProgressSender").field("sink", &kind).finish()
    }
}

/// Creates a progress sender and the stream of events it feeds.
#[must_use]
pub fn progress_channel() -> (ProgressSender, UnboundedReceiverStream<ImportProgressEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        ProgressSender {
            sink: Sink::Channel(tx),
        },
        UnboundedReceiverStream::new(rx),
    )
}
