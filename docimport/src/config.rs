//! Import limits.

use serde::{Deserialize, Serialize};

use crate::errors::ImportError;
use crate::types::ImportFile;

/// Default maximum number of files per import.
pub const DEFAULT_MAX_FILES: usize = 5;

/// Default maximum file size (10 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Request-level limits checked before any external call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportLimits {
    /// Maximum files per import.
    pub max_files: usize,
    /// Maximum size of any single file, in bytes.
    pub max_file_size: u64,
}

impl Default for ImportLimits {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl ImportLimits {
    /// Create limits with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum file count.
    #[must_use]
    pub const fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }

    /// Sets the maximum file size.
    #[must_use]
    pub const fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    /// Parses limits from TOML; missing keys keep their defaults.
    ///
    /// ```toml
    /// max_files = 3
    /// max_file_size = 5242880
    /// ```
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Checks count and per-file size.
    pub fn validate(&self, files: &[ImportFile]) -> Result<(), ImportError> {
        if files.is_empty() {
            return Err(ImportError::NoFiles);
        }
        if files.len() > self.max_files {
            return Err(ImportError::TooManyFiles {
                count: files.len(),
                max: self.max_files,
            });
        }
        if let Some(file) = files
            .iter()
            .find(|file| file.effective_size() > self.max_file_size)
        {
            return Err(ImportError::FileTooLarge {
                name: file.name.clone(),
                size: file.effective_size(),
                max: self.max_file_size,
            });
        }
        Ok(())
    }
}
