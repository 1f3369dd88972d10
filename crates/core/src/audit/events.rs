use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of row an audit event belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    DownloadJob,
    ImportTask,
}

impl SubjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectKind::DownloadJob => "download_job",
            SubjectKind::ImportTask => "import_task",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "download_job" => Some(SubjectKind::DownloadJob),
            "import_task" => Some(SubjectKind::ImportTask),
            _ => None,
        }
    }
}

/// Event type names written to the log.
pub mod event_types {
    pub const JOB_CREATED: &str = "job_created";
    pub const JOB_ENQUEUED: &str = "job_enqueued";
    pub const JOB_STATUS_CHANGED: &str = "status_changed";
    pub const JOB_RETRY_SCHEDULED: &str = "retry_scheduled";
    pub const JOB_FAILED: &str = "failed";
    pub const JOB_CANCELLED: &str = "cancelled";
    pub const TASK_CREATED: &str = "task_created";
    pub const TASK_STARTED: &str = "started";
    pub const TASK_COMPLETED: &str = "completed";
    pub const TASK_RETRY_SCHEDULED: &str = "retry_scheduled";
    pub const TASK_FAILED: &str = "failed";
    pub const TASK_CANCELLED: &str = "cancelled";
    pub const TASK_SOURCE_HEALED: &str = "source_path_updated";
    pub const TASK_CATALOG_FAILED: &str = "catalog_insert_failed";
    pub const REIMPORT_REQUESTED: &str = "reimport_requested";
}

/// A stored audit row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub subject_kind: SubjectKind,
    pub subject_id: String,
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// An audit row about to be appended.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEvent {
    pub subject_kind: SubjectKind,
    pub subject_id: String,
    pub event_type: String,
    pub old_status: Option<String>,
    pub new_status: Option<String>,
    pub message: Option<String>,
    pub metadata: serde_json::Value,
}

impl NewAuditEvent {
    pub fn new(
        subject_kind: SubjectKind,
        subject_id: impl Into<String>,
        event_type: impl Into<String>,
    ) -> Self {
        Self {
            subject_kind,
            subject_id: subject_id.into(),
            event_type: event_type.into(),
            old_status: None,
            new_status: None,
            message: None,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn job(id: impl Into<String>, event_type: impl Into<String>) -> Self {
        Self::new(SubjectKind::DownloadJob, id, event_type)
    }

    pub fn task(id: impl Into<String>, event_type: impl Into<String>) -> Self {
        Self::new(SubjectKind::ImportTask, id, event_type)
    }

    pub fn transition(mut self, old: impl ToString, new: impl ToString) -> Self {
        self.old_status = Some(old.to_string());
        self.new_status = Some(new.to_string());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}
