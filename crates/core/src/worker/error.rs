//! Failure classification for worker side effects.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::downloader::DownloaderError;
use crate::import::{CatalogError, ImportError};
use crate::job::JobError;
use crate::placer::PlacerError;
use crate::render::RenderError;
use crate::settings::SettingsError;

/// Whether a failure is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Transient,
    Permanent,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Transient => "transient",
            ErrorCategory::Permanent => "permanent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "transient" => Some(ErrorCategory::Transient),
            "permanent" => Some(ErrorCategory::Permanent),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed unit of work with its retry category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkError {
    pub category: ErrorCategory,
    pub message: String,
}

impl WorkError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            category: ErrorCategory::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            category: ErrorCategory::Permanent,
            message: message.into(),
        }
    }

    pub fn is_permanent(&self) -> bool {
        self.category == ErrorCategory::Permanent
    }
}

impl fmt::Display for WorkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.category)
    }
}

impl std::error::Error for WorkError {}

fn categorized(retryable: bool, message: String) -> WorkError {
    if retryable {
        WorkError::transient(message)
    } else {
        WorkError::permanent(message)
    }
}

impl From<PlacerError> for WorkError {
    fn from(e: PlacerError) -> Self {
        categorized(e.is_retryable(), e.to_string())
    }
}

impl From<DownloaderError> for WorkError {
    fn from(e: DownloaderError) -> Self {
        categorized(e.is_retryable(), e.to_string())
    }
}

impl From<RenderError> for WorkError {
    fn from(e: RenderError) -> Self {
        WorkError::permanent(e.to_string())
    }
}

// Store and settings failures are infrastructure problems; they may clear up.
impl From<JobError> for WorkError {
    fn from(e: JobError) -> Self {
        WorkError::transient(e.to_string())
    }
}

impl From<ImportError> for WorkError {
    fn from(e: ImportError) -> Self {
        WorkError::transient(e.to_string())
    }
}

impl From<CatalogError> for WorkError {
    fn from(e: CatalogError) -> Self {
        WorkError::transient(e.to_string())
    }
}

impl From<SettingsError> for WorkError {
    fn from(e: SettingsError) -> Self {
        WorkError::transient(e.to_string())
    }
}

impl From<std::io::Error> for WorkError {
    fn from(e: std::io::Error) -> Self {
        WorkError::transient(e.to_string())
    }
}
