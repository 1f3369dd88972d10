//! Import task types and state machine.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::candidate::MediaRef;
use crate::placer::ImportMethod;
use crate::worker::ErrorCategory;

/// Lifecycle state of an import task.
///
/// ```text
/// pending -> in_progress -> completed
///               |  \-> failed
///               \-> pending (retry)
/// pending | in_progress -> cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Completed,
        TaskStatus::Failed,
        TaskStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// Still waiting for or undergoing work.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (Pending, Cancelled)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (InProgress, Pending)
                | (InProgress, Cancelled)
        )
    }

    /// Only finished tasks can be imported again.
    pub fn can_reimport(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown task status: {}", s))
    }
}

/// Moves one downloaded file into a library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportTask {
    pub id: String,
    pub status: TaskStatus,
    pub download_job_id: Option<String>,
    /// Task this one re-runs, for reimports.
    pub previous_task_id: Option<String>,
    pub source_path: String,
    /// Absolute destination, set once the file is placed.
    pub dest_path: Option<String>,
    pub import_method: Option<ImportMethod>,
    pub media: MediaRef,
    pub library_id: String,
    pub name_template_id: String,
    pub candidate_title: String,
    pub attempt_count: u32,
    pub max_attempts: u32,
    pub next_run_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub error_category: Option<ErrorCategory>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ImportTask {
    pub fn is_reimport(&self) -> bool {
        self.previous_task_id.is_some()
    }
}

/// Fields needed to create a task.
#[derive(Debug, Clone, PartialEq)]
pub struct NewImportTask {
    pub download_job_id: Option<String>,
    pub source_path: String,
    pub media: MediaRef,
    pub library_id: String,
    pub name_template_id: String,
    pub candidate_title: String,
    pub max_attempts: u32,
}

/// Changes applied together with a task transition. Unset fields keep their value.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskUpdate {
    pub status: TaskStatus,
    pub source_path: Option<String>,
    pub dest_path: Option<String>,
    pub import_method: Option<ImportMethod>,
    pub attempt_count: Option<u32>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub error: Option<(String, ErrorCategory)>,
}

impl TaskUpdate {
    pub fn to(status: TaskStatus) -> Self {
        Self {
            status,
            source_path: None,
            dest_path: None,
            import_method: None,
            attempt_count: None,
            next_run_at: None,
            error: None,
        }
    }

    pub fn with_source(mut self, path: impl Into<String>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    pub fn with_destination(mut self, path: impl Into<String>, method: ImportMethod) -> Self {
        self.dest_path = Some(path.into());
        self.import_method = Some(method);
        self
    }

    pub fn with_error(mut self, message: impl Into<String>, category: ErrorCategory) -> Self {
        self.error = Some((message.into(), category));
        self
    }

    pub fn retry(mut self, attempt_count: u32, next_run_at: DateTime<Utc>) -> Self {
        self.attempt_count = Some(attempt_count);
        self.next_run_at = Some(next_run_at);
        self
    }
}

/// Filter for querying tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub download_job_id: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl TaskFilter {
    pub fn new() -> Self {
        Self {
            status: None,
            download_job_id: None,
            limit: 100,
            offset: 0,
        }
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_job(mut self, job_id: impl Into<String>) -> Self {
        self.download_job_id = Some(job_id.into());
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}
