//! Download job storage trait and types.

use std::time::Duration;

use thiserror::Error;

use super::{DownloadJob, JobStatus, JobUpdate, NewDownloadJob};

/// Error type for job operations.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Download job not found: {0}")]
    NotFound(String),

    /// The row was not in the state the caller expected; someone else moved it.
    #[error("Download job {id} is {actual}, expected {expected}")]
    Conflict {
        id: String,
        expected: JobStatus,
        actual: JobStatus,
    },

    #[error("Invalid download job transition: {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Filter for querying jobs.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub downloader_id: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl JobFilter {
    pub fn new() -> Self {
        Self {
            status: None,
            downloader_id: None,
            limit: 100,
            offset: 0,
        }
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_downloader(mut self, downloader_id: impl Into<String>) -> Self {
        self.downloader_id = Some(downloader_id.into());
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

/// Trait for download job storage backends.
///
/// The store is the only source of truth for job state. Every transition is
/// one conditional write keyed on the state the caller last observed.
pub trait JobStore: Send + Sync {
    /// Insert a pending job unless a non-terminal job already exists for the same
    /// candidate and media. Returns the job and whether it was created.
    fn create_unless_active(&self, job: NewDownloadJob) -> Result<(DownloadJob, bool), JobError>;

    fn get(&self, id: &str) -> Result<Option<DownloadJob>, JobError>;

    /// Jobs matching the filter, newest first.
    fn list(&self, filter: &JobFilter) -> Result<Vec<DownloadJob>, JobError>;

    fn count(&self, filter: &JobFilter) -> Result<i64, JobError>;

    /// Atomically lease up to `limit` runnable jobs for `lease`.
    ///
    /// A job is runnable when it is not terminal, its `next_run_at` has passed
    /// and no unexpired lease is held on it.
    fn claim_runnable(&self, limit: usize, lease: Duration) -> Result<Vec<DownloadJob>, JobError>;

    /// Apply `update` if the job is still in `expected`. Releases the lease.
    fn apply(&self, id: &str, expected: JobStatus, update: JobUpdate)
        -> Result<DownloadJob, JobError>;

    /// Cancel a non-terminal job. Returns the previous status and the cancelled job.
    fn cancel(&self, id: &str) -> Result<(JobStatus, DownloadJob), JobError>;
}
