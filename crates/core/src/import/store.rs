//! Import task storage trait and error type.

use std::time::Duration;

use thiserror::Error;

use super::{ImportTask, NewImportTask, TaskFilter, TaskStatus, TaskUpdate};

/// Error type for import task operations.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Import task not found: {0}")]
    NotFound(String),

    #[error("Import task {id} is {actual}, expected {expected}")]
    Conflict {
        id: String,
        expected: TaskStatus,
        actual: TaskStatus,
    },

    #[error("Invalid import task transition: {from} -> {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },

    #[error("Import task {id} is {status}; only completed or failed tasks can be reimported")]
    CannotReimport { id: String, status: TaskStatus },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Trait for import task storage backends.
pub trait ImportTaskStore: Send + Sync {
    fn create(&self, task: NewImportTask) -> Result<ImportTask, ImportError>;

    fn get(&self, id: &str) -> Result<Option<ImportTask>, ImportError>;

    /// Tasks matching the filter, newest first.
    fn list(&self, filter: &TaskFilter) -> Result<Vec<ImportTask>, ImportError>;

    fn count(&self, filter: &TaskFilter) -> Result<i64, ImportError>;

    /// Every task created for a download job, oldest first.
    fn list_for_job(&self, job_id: &str) -> Result<Vec<ImportTask>, ImportError>;

    /// Atomically move up to `limit` due pending tasks to `in_progress`.
    fn claim_runnable(&self, limit: usize) -> Result<Vec<ImportTask>, ImportError>;

    /// Apply `update` if the task is still in `expected`.
    fn apply(
        &self,
        id: &str,
        expected: TaskStatus,
        update: TaskUpdate,
    ) -> Result<ImportTask, ImportError>;

    /// Cancel a pending or running task. Returns the previous status and the cancelled task.
    fn cancel(&self, id: &str) -> Result<(TaskStatus, ImportTask), ImportError>;

    /// Cancel every pending task of a job. Returns the cancelled tasks.
    fn cancel_pending_for_job(&self, job_id: &str) -> Result<Vec<ImportTask>, ImportError>;

    /// Create a new pending task re-running a completed or failed one.
    fn reimport(&self, id: &str) -> Result<ImportTask, ImportError>;

    /// The reimport chain through `id`, newest first.
    fn history(&self, id: &str) -> Result<Vec<ImportTask>, ImportError>;

    /// Return `in_progress` tasks untouched for `older_than` to `pending`.
    /// Used at startup to recover from a crash mid-import.
    fn reset_stale(&self, older_than: Duration) -> Result<usize, ImportError>;
}
