//! Types for downloader operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::candidate::Protocol;

/// Errors that can occur during downloader operations.
#[derive(Debug, Error)]
pub enum DownloaderError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Download not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Operation unsupported: {0}")]
    Unsupported(&'static str),
}

impl DownloaderError {
    /// Network trouble and backend hiccups clear up; bad requests do not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed(_) | Self::AuthenticationFailed(_) | Self::Api(_) | Self::Timeout
        )
    }
}

/// Normalized status of an item inside a downloader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Queued,
    Downloading,
    Paused,
    Completed,
    Seeding,
    Errored,
    Unknown,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Queued => "queued",
            ItemStatus::Downloading => "downloading",
            ItemStatus::Paused => "paused",
            ItemStatus::Completed => "completed",
            ItemStatus::Seeding => "seeding",
            ItemStatus::Errored => "errored",
            ItemStatus::Unknown => "unknown",
        }
    }

    /// Payload is fully on disk.
    pub fn is_complete(&self) -> bool {
        matches!(self, ItemStatus::Completed | ItemStatus::Seeding)
    }
}

/// Request to add a download.
#[derive(Debug, Clone, Default)]
pub struct AddRequest {
    /// Magnet URI or URL of a .torrent/.nzb file.
    pub url: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub save_path: Option<String>,
    pub paused: bool,
}

impl AddRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_save_path(mut self, path: impl Into<String>) -> Self {
        self.save_path = Some(path.into());
        self
    }
}

/// Result of adding a download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddResult {
    /// Identifier assigned by the downloader (torrent hash, nzb id).
    pub external_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A download as seen by the downloader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadItem {
    pub external_id: String,
    pub name: String,
    pub status: ItemStatus,
    /// 0.0 to 1.0.
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_path: Option<String>,
    /// Root file or directory of the payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
}

/// A file inside a download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadFile {
    /// Relative to the save path when the backend reports it that way.
    pub path: String,
    pub size: u64,
    #[serde(default)]
    pub progress: f64,
}

impl DownloadFile {
    pub fn new(path: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
            progress: 1.0,
        }
    }
}

/// An acquisition backend.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Configured instance id.
    fn id(&self) -> &str;

    /// Backend name, e.g. `qbittorrent`.
    fn backend(&self) -> &str;

    fn protocol(&self) -> Protocol;

    /// Hand a release to the backend. Returns the backend's id for it.
    async fn add(&self, request: AddRequest) -> Result<AddResult, DownloaderError>;

    async fn get(&self, external_id: &str) -> Result<DownloadItem, DownloaderError>;

    async fn list(&self) -> Result<Vec<DownloadItem>, DownloaderError> {
        Err(DownloaderError::Unsupported("list"))
    }

    async fn list_files(&self, _external_id: &str) -> Result<Vec<DownloadFile>, DownloaderError> {
        Err(DownloaderError::Unsupported("list_files"))
    }
}
