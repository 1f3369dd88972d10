//! Types for the placer module.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A single file placement request.
#[derive(Debug, Clone)]
pub struct FilePlacement {
    /// Source file path.
    pub source: PathBuf,
    /// Destination file path.
    pub destination: PathBuf,
    /// Replace an existing destination instead of failing.
    pub overwrite: bool,
    /// Verify checksum after copy (optional). Hardlinks are never verified.
    pub verify: Option<ChecksumType>,
}

impl FilePlacement {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            overwrite: false,
            verify: None,
        }
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_verification(mut self, verify: Option<ChecksumType>) -> Self {
        self.verify = verify;
        self
    }
}

/// Type of checksum to verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecksumType {
    /// SHA-256 checksum.
    Sha256,
    /// MD5 checksum (faster but less secure).
    Md5,
}

/// How a file reached its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportMethod {
    Hardlink,
    Copy,
}

impl ImportMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportMethod::Hardlink => "hardlink",
            ImportMethod::Copy => "copy",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "hardlink" => Some(ImportMethod::Hardlink),
            "copy" => Some(ImportMethod::Copy),
            _ => None,
        }
    }
}

impl fmt::Display for ImportMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Information about a placed file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedFile {
    /// Final destination path.
    pub destination: PathBuf,
    pub method: ImportMethod,
    /// File size in bytes.
    pub size_bytes: u64,
    /// Checksum if verified.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}
