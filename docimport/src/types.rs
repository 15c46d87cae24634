//! Request and result types for the import workflow.

use serde::{Deserialize, Serialize};

/// Media type used when neither the declaration nor the file name says more.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Which sheet of a spreadsheet payload to read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SheetSelector {
    /// Zero-based sheet index.
    Index(u32),
    /// Sheet name.
    Name(String),
}

impl SheetSelector {
    /// One-line prompt hint naming the sheet.
    #[must_use]
    pub fn prompt_hint(&self) -> String {
        match self {
            Self::Index(index) => format!("Only use sheet number {}.", index + 1),
            Self::Name(name) => format!("Only use the sheet named \"{name}\"."),
        }
    }
}

/// One user-supplied file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportFile {
    /// Original file name.
    pub name: String,
    /// Declared media type, if the client sent one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    /// Base64-encoded content.
    pub content: String,
    /// Declared size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Advisory sheet hint for spreadsheets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet: Option<SheetSelector>,
}

impl ImportFile {
    /// Creates a file with no declared media type or size.
    #[must_use]
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            media_type: None,
            content: content.into(),
            size: None,
            sheet: None,
        }
    }

    /// Sets the declared media type.
    #[must_use]
    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    /// Sets the declared size.
    #[must_use]
    pub const fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Sets the sheet hint.
    #[must_use]
    pub fn with_sheet(mut self, sheet: SheetSelector) -> Self {
        self.sheet = Some(sheet);
        self
    }

    /// The declared media type, else one guessed from the file name, else
    /// `application/octet-stream`.
    #[must_use]
    pub fn resolved_media_type(&self) -> String {
        if let Some(declared) = self.media_type.as_deref().map(str::trim) {
            if !declared.is_empty() {
                return declared.to_string();
            }
        }
        mime_guess::from_path(&self.name)
            .first_raw()
            .unwrap_or(OCTET_STREAM)
            .to_string()
    }

    /// The declared size, or the decoded size implied by the base64 length.
    #[must_use]
    pub fn effective_size(&self) -> u64 {
        self.size.unwrap_or_else(|| {
            let encoded = self.content.trim_end_matches('=').len() as u64;
            encoded * 3 / 4
        })
    }
}

/// How the domain should treat matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Apply matches without confirmation.
    #[default]
    Auto,
    /// Stage matches for user review.
    Review,
}

/// Per-call options consumed by domain prompt builders and processors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImportOptions {
    /// Auto-apply or review.
    pub mode: ImportMode,
    /// BCP 47 locale for prompts and parsing.
    pub locale: String,
    /// Minimum similarity in `[0, 1]` for matching against existing records.
    pub match_threshold: f32,
    /// Keep existing progressions when replacing records.
    pub preserve_progressions: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            mode: ImportMode::Auto,
            locale: "en".to_string(),
            match_threshold: 0.8,
            preserve_progressions: false,
        }
    }
}

impl ImportOptions {
    /// Sets the mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: ImportMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the locale.
    #[must_use]
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    /// Sets the match threshold, clamped to `[0, 1]`.
    #[must_use]
    pub fn with_match_threshold(mut self, threshold: f32) -> Self {
        self.match_threshold = threshold.clamp(0.0, 1.0);
        self
    }
}

/// Terminal outcome of one import call.
///
/// `details` carries the domain's own fields and is flattened when
/// serialized, so the wire shape is `{ success, errors?, warnings?, ...details }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportResult<D> {
    /// Whether the import completed.
    pub success: bool,
    /// User-facing failure messages.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    /// Non-fatal notes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Domain-specific fields.
    #[serde(flatten)]
    pub details: D,
}

impl<D> ImportResult<D> {
    /// A successful result.
    #[must_use]
    pub const fn succeeded(details: D, warnings: Vec<String>) -> Self {
        Self {
            success: true,
            errors: Vec::new(),
            warnings,
            details,
        }
    }

    /// A failed result.
    #[must_use]
    pub const fn failed(details: D, errors: Vec<String>) -> Self {
        Self {
            success: false,
            errors,
            warnings: Vec::new(),
            details,
        }
    }
}

/// What a domain's persist step hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistOutcome<D> {
    /// Domain fields for the result.
    pub details: D,
    /// Warnings to add to the result.
    pub warnings: Vec<String>,
}

impl<D> PersistOutcome<D> {
    /// An outcome with no warnings.
    #[must_use]
    pub const fn new(details: D) -> Self {
        Self {
            details,
            warnings: Vec::new(),
        }
    }

    /// Adds warnings.
    #[must_use]
    pub fn with_warnings(mut self, warnings: impl IntoIterator<Item = String>) -> Self {
        self.warnings.extend(warnings);
        self
    }
}
