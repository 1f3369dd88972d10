//! User-facing download job operations.

use std::sync::Arc;

use tracing::{info, warn};

use super::{DownloadJob, JobError, JobFilter, JobStore};
use crate::audit::{event_types, AuditLog, AuditRecord, NewAuditEvent, SubjectKind};
use crate::events::EventPublisher;
use crate::import::{ImportTask, ImportTaskStore, TaskStatus};

pub struct JobService {
    jobs: Arc<dyn JobStore>,
    tasks: Arc<dyn ImportTaskStore>,
    audit: AuditLog,
    events: EventPublisher,
}

impl JobService {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        tasks: Arc<dyn ImportTaskStore>,
        audit: AuditLog,
        events: EventPublisher,
    ) -> Self {
        Self {
            jobs,
            tasks,
            audit,
            events,
        }
    }

    pub fn get(&self, id: &str) -> Result<DownloadJob, JobError> {
        self.jobs
            .get(id)?
            .ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    pub fn list(&self, filter: &JobFilter) -> Result<(Vec<DownloadJob>, i64), JobError> {
        Ok((self.jobs.list(filter)?, self.jobs.count(filter)?))
    }

    /// Import tasks created for a job, oldest first.
    pub fn tasks_for(&self, id: &str) -> Result<Vec<ImportTask>, JobError> {
        self.get(id)?;
        self.tasks
            .list_for_job(id)
            .map_err(|e| JobError::Database(e.to_string()))
    }

    /// Cancel a job and any of its tasks that have not started.
    ///
    /// The downloader is left alone; the job worker stops polling a cancelled
    /// job on its next claim.
    pub fn cancel_job(&self, id: &str) -> Result<DownloadJob, JobError> {
        let (previous, job) = self.jobs.cancel(id)?;
        self.audit.record(
            NewAuditEvent::job(id, event_types::JOB_CANCELLED).transition(previous, job.status),
        );
        self.events.job_updated(id);
        info!(job_id = %id, from = %previous, "Download job cancelled");

        match self.tasks.cancel_pending_for_job(id) {
            Ok(cancelled) => {
                for task in cancelled {
                    self.audit.record(
                        NewAuditEvent::task(&task.id, event_types::TASK_CANCELLED)
                            .transition(TaskStatus::Pending, task.status)
                            .with_message(format!("download job {} cancelled", id)),
                    );
                    self.events.task_updated(&task.id);
                }
            }
            Err(e) => warn!(job_id = %id, error = %e, "Failed to cancel pending import tasks"),
        }

        Ok(job)
    }

    /// Audit rows for a job, oldest first.
    pub fn timeline(&self, id: &str) -> Result<Vec<AuditRecord>, JobError> {
        self.get(id)?;
        self.audit
            .timeline(SubjectKind::DownloadJob, id)
            .map_err(|e| JobError::Database(e.to_string()))
    }
}
