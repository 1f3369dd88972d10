//! Download job types and state machine.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::candidate::{MediaRef, Protocol};
use crate::worker::ErrorCategory;

/// Lifecycle state of a download job.
///
/// ```text
/// pending -> enqueued -> downloading -> importing -> imported
///               \-----------------------^
/// any non-terminal -> failed | cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Enqueued,
    Downloading,
    Importing,
    Imported,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub const ALL: [JobStatus; 7] = [
        JobStatus::Pending,
        JobStatus::Enqueued,
        JobStatus::Downloading,
        JobStatus::Importing,
        JobStatus::Imported,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Enqueued => "enqueued",
            JobStatus::Downloading => "downloading",
            JobStatus::Importing => "importing",
            JobStatus::Imported => "imported",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Imported | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Whether `self -> next` is a legal transition. Staying in the same
    /// state is not a transition.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (s, Failed | Cancelled) => !s.is_terminal(),
            (Pending, Enqueued)
            | (Enqueued, Downloading)
            | (Enqueued, Importing)
            | (Downloading, Importing)
            | (Importing, Imported) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown job status: {}", s))
    }
}

/// A durable acquisition attempt for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadJob {
    pub id: String,
    pub status: JobStatus,
    pub indexer_id: i64,
    pub guid: String,
    pub candidate_title: String,
    pub candidate_link: String,
    pub protocol: Protocol,
    pub media: MediaRef,
    pub downloader_id: String,
    pub library_id: String,
    pub name_template_id: String,
    /// Id assigned by the downloader (torrent hash for qBittorrent).
    pub external_id: Option<String>,
    /// 0.0 to 1.0.
    pub progress: f64,
    pub save_path: Option<String>,
    pub content_path: Option<String>,
    pub import_source_path: Option<String>,
    pub attempt_count: u32,
    pub max_attempts: u32,
    pub next_run_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed_until: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub error_category: Option<ErrorCategory>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Fields needed to create a job.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDownloadJob {
    pub indexer_id: i64,
    pub guid: String,
    pub candidate_title: String,
    pub candidate_link: String,
    pub protocol: Protocol,
    pub media: MediaRef,
    pub downloader_id: String,
    pub library_id: String,
    pub name_template_id: String,
    pub max_attempts: u32,
}

/// Changes applied together with a status transition (or a same-status refresh).
///
/// Unset fields keep their stored value. Every apply releases the claim lease.
#[derive(Debug, Clone, PartialEq)]
pub struct JobUpdate {
    pub status: JobStatus,
    pub external_id: Option<String>,
    pub progress: Option<f64>,
    pub save_path: Option<String>,
    pub content_path: Option<String>,
    pub import_source_path: Option<String>,
    pub attempt_count: Option<u32>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub error: Option<(String, ErrorCategory)>,
}

impl JobUpdate {
    pub fn to(status: JobStatus) -> Self {
        Self {
            status,
            external_id: None,
            progress: None,
            save_path: None,
            content_path: None,
            import_source_path: None,
            attempt_count: None,
            next_run_at: None,
            error: None,
        }
    }

    pub fn with_external_id(mut self, id: impl Into<String>) -> Self {
        self.external_id = Some(id.into());
        self
    }

    pub fn with_progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress.clamp(0.0, 1.0));
        self
    }

    pub fn with_paths(mut self, save_path: Option<String>, content_path: Option<String>) -> Self {
        self.save_path = save_path;
        self.content_path = content_path;
        self
    }

    pub fn with_import_source(mut self, path: impl Into<String>) -> Self {
        self.import_source_path = Some(path.into());
        self
    }

    pub fn with_error(mut self, message: impl Into<String>, category: ErrorCategory) -> Self {
        self.error = Some((message.into(), category));
        self
    }

    /// Schedule another attempt.
    pub fn retry(mut self, attempt_count: u32, next_run_at: DateTime<Utc>) -> Self {
        self.attempt_count = Some(attempt_count);
        self.next_run_at = Some(next_run_at);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Enqueued));
        assert!(JobStatus::Enqueued.can_transition_to(JobStatus::Downloading));
        assert!(JobStatus::Enqueued.can_transition_to(JobStatus::Importing));
        assert!(JobStatus::Downloading.can_transition_to(JobStatus::Importing));
        assert!(JobStatus::Importing.can_transition_to(JobStatus::Imported));
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Downloading));
        assert!(!JobStatus::Downloading.can_transition_to(JobStatus::Enqueued));
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Pending));
        assert!(!JobStatus::Imported.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Cancelled.can_transition_to(JobStatus::Cancelled));
    }

    #[test]
    fn test_non_terminal_can_fail_or_cancel() {
        for status in JobStatus::ALL.iter().filter(|s| !s.is_terminal()) {
            assert!(status.can_transition_to(JobStatus::Failed));
            assert!(status.can_transition_to(JobStatus::Cancelled));
        }
    }

    #[test]
    fn test_status_strings() {
        for status in JobStatus::ALL {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
            assert_eq!(
                serde_json::to_string(&status).unwrap(),
                format!("\"{}\"", status.as_str())
            );
        }
        assert!("created".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_progress_is_clamped() {
        let update = JobUpdate::to(JobStatus::Downloading).with_progress(1.7);
        assert_eq!(update.progress, Some(1.0));
    }
}
