//! Drives download jobs from submission to import hand-off.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};

use super::sources::{resolve_file_path, select_sources};
use super::{decide, ErrorCategory, RetryDecision, WorkError};
use crate::audit::{event_types, AuditLog, NewAuditEvent};
use crate::candidate::{MediaRef, Protocol};
use crate::downloader::{
    AddRequest, DownloadItem, Downloader, DownloaderError, DownloaderRegistry, ItemStatus,
};
use crate::events::EventPublisher;
use crate::import::{ImportTaskStore, NewImportTask, TaskStatus};
use crate::job::{DownloadJob, JobError, JobStatus, JobStore, JobUpdate};
use crate::metrics::{JOB_OUTCOMES, ROWS_CLAIMED};
use crate::settings::SettingsService;

/// Tag put on everything this worker hands to a downloader.
const DOWNLOAD_TAG: &str = "snaggle";

/// Used when the settings store cannot be read while scheduling a retry.
const FALLBACK_MAX_ATTEMPTS: u32 = 10;

pub struct JobWorker {
    jobs: Arc<dyn JobStore>,
    tasks: Arc<dyn ImportTaskStore>,
    downloaders: DownloaderRegistry,
    settings: Arc<SettingsService>,
    audit: AuditLog,
    events: EventPublisher,
    claim_limit: usize,
    lease: Duration,
}

impl JobWorker {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        tasks: Arc<dyn ImportTaskStore>,
        downloaders: DownloaderRegistry,
        settings: Arc<SettingsService>,
        audit: AuditLog,
        events: EventPublisher,
    ) -> Self {
        Self {
            jobs,
            tasks,
            downloaders,
            settings,
            audit,
            events,
            claim_limit: 20,
            lease: Duration::from_secs(300),
        }
    }

    pub fn with_claim(mut self, limit: usize, lease: Duration) -> Self {
        self.claim_limit = limit;
        self.lease = lease;
        self
    }

    /// Claim one batch of runnable jobs and advance each. Returns the batch size.
    pub async fn run_once(&self) -> Result<usize, JobError> {
        let claimed = self.jobs.claim_runnable(self.claim_limit, self.lease)?;
        if claimed.is_empty() {
            return Ok(0);
        }
        ROWS_CLAIMED
            .with_label_values(&["job"])
            .inc_by(claimed.len() as u64);
        debug!(count = claimed.len(), "Claimed download jobs");

        for job in &claimed {
            if let Err(e) = self.process(job).await {
                self.handle_error(job, e);
            }
        }
        Ok(claimed.len())
    }

    async fn process(&self, job: &DownloadJob) -> Result<(), WorkError> {
        match job.status {
            JobStatus::Pending => self.submit(job).await,
            JobStatus::Enqueued | JobStatus::Downloading => self.poll(job).await,
            JobStatus::Importing => self.finalize(job),
            status => {
                debug!(job_id = %job.id, status = %status, "Skipping terminal job");
                Ok(())
            }
        }
    }

    fn downloader_for(&self, job: &DownloadJob) -> Result<Arc<dyn Downloader>, WorkError> {
        self.downloaders.get(&job.downloader_id).ok_or_else(|| {
            WorkError::permanent(format!("unknown downloader: {}", job.downloader_id))
        })
    }

    async fn submit(&self, job: &DownloadJob) -> Result<(), WorkError> {
        if job.protocol == Protocol::Unknown {
            return Err(WorkError::permanent("unknown protocol"));
        }
        if job.candidate_link.trim().is_empty() {
            return Err(WorkError::permanent("candidate has no download link"));
        }
        let downloader = self.downloader_for(job)?;
        let added = downloader
            .add(AddRequest::new(&job.candidate_link).with_tag(DOWNLOAD_TAG))
            .await?;

        let updated = self.jobs.apply(
            &job.id,
            job.status,
            JobUpdate::to(JobStatus::Enqueued).with_external_id(&added.external_id),
        )?;
        self.audit.record(
            NewAuditEvent::job(&job.id, event_types::JOB_ENQUEUED)
                .transition(job.status, updated.status)
                .with_metadata(json!({
                    "downloader_id": job.downloader_id,
                    "external_id": added.external_id,
                })),
        );
        self.events.job_updated(&job.id);
        info!(
            job_id = %job.id,
            downloader = %job.downloader_id,
            external_id = %added.external_id,
            "Download job submitted"
        );
        Ok(())
    }

    async fn poll(&self, job: &DownloadJob) -> Result<(), WorkError> {
        let downloader = self.downloader_for(job)?;
        let external_id = job
            .external_id
            .as_deref()
            .ok_or_else(|| WorkError::permanent("job has no downloader reference"))?;
        let item = downloader.get(external_id).await?;

        if item.status.is_complete() {
            return self.hand_off(job, downloader.as_ref(), &item).await;
        }
        if item.status == ItemStatus::Errored {
            return Err(WorkError::permanent(format!(
                "downloader reported an error for {}",
                item.name
            )));
        }

        let updated = self.jobs.apply(
            &job.id,
            job.status,
            JobUpdate::to(JobStatus::Downloading)
                .with_progress(item.progress)
                .with_paths(item.save_path.clone(), item.content_path.clone()),
        )?;
        if job.status != updated.status {
            self.audit.record(
                NewAuditEvent::job(&job.id, event_types::JOB_STATUS_CHANGED)
                    .transition(job.status, updated.status),
            );
            info!(job_id = %job.id, "Download started");
        }
        if job.status != updated.status || (job.progress - updated.progress).abs() > f64::EPSILON {
            self.events.job_updated(&job.id);
        }
        Ok(())
    }

    /// Create import tasks for a finished download and move the job to importing.
    async fn hand_off(
        &self,
        job: &DownloadJob,
        downloader: &dyn Downloader,
        item: &DownloadItem,
    ) -> Result<(), WorkError> {
        let save_path = item.save_path.clone().or_else(|| job.save_path.clone());
        let content_path = item.content_path.clone().or_else(|| job.content_path.clone());

        // A previous attempt may have created the tasks before failing to move the job.
        let existing = self.tasks.list_for_job(&job.id)?;
        let sources: Vec<String> = if existing.is_empty() {
            let selected = self
                .import_sources(job, downloader, save_path.as_deref(), content_path.as_deref())
                .await?;
            let max_attempts = self.settings.imports_max_attempts()?;
            let mut paths = Vec::with_capacity(selected.len());
            for (media, source_path) in selected {
                let task = self.tasks.create(NewImportTask {
                    download_job_id: Some(job.id.clone()),
                    source_path: source_path.clone(),
                    media,
                    library_id: job.library_id.clone(),
                    name_template_id: job.name_template_id.clone(),
                    candidate_title: job.candidate_title.clone(),
                    max_attempts,
                })?;
                self.audit.record(
                    NewAuditEvent::task(&task.id, event_types::TASK_CREATED).with_metadata(json!({
                            "download_job_id": job.id,
                            "source_path": source_path,
                        })),
                );
                self.events.task_updated(&task.id);
                paths.push(source_path);
            }
            paths
        } else {
            existing.into_iter().map(|t| t.source_path).collect()
        };

        let mut update = JobUpdate::to(JobStatus::Importing)
            .with_progress(1.0)
            .with_paths(save_path, content_path);
        if let Some(first) = sources.first() {
            update = update.with_import_source(first);
        }
        let updated = self.jobs.apply(&job.id, job.status, update)?;
        self.audit.record(
            NewAuditEvent::job(&job.id, event_types::JOB_STATUS_CHANGED)
                .transition(job.status, updated.status)
                .with_message(format!(
                    "download complete, {} import task(s)",
                    sources.len()
                )),
        );
        self.events.job_updated(&job.id);
        info!(job_id = %job.id, tasks = sources.len(), "Download complete, importing");
        Ok(())
    }

    async fn import_sources(
        &self,
        job: &DownloadJob,
        downloader: &dyn Downloader,
        save_path: Option<&str>,
        content_path: Option<&str>,
    ) -> Result<Vec<(MediaRef, String)>, WorkError> {
        let external_id = job.external_id.as_deref().unwrap_or_default();
        let files = match downloader.list_files(external_id).await {
            Ok(files) => files,
            Err(DownloaderError::Unsupported(_)) => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        if files.is_empty() {
            let path = content_path
                .or(save_path)
                .filter(|p| !p.is_empty())
                .ok_or_else(|| WorkError::permanent("download reported no content path"))?;
            return Ok(vec![(job.media.clone(), path.to_string())]);
        }

        let selected = select_sources(&job.media, &files);
        if selected.is_empty() {
            return Err(WorkError::permanent(format!(
                "no importable files found in {}",
                job.candidate_title
            )));
        }
        selected
            .into_iter()
            .map(|(media, file)| {
                resolve_file_path(&file.path, save_path, content_path)
                    .map(|path| (media, path))
                    .ok_or_else(|| {
                        WorkError::permanent(format!(
                            "unable to determine source path for {}",
                            file.path
                        ))
                    })
            })
            .collect()
    }

    /// Settle an importing job once its tasks are done.
    fn finalize(&self, job: &DownloadJob) -> Result<(), WorkError> {
        let tasks = self.tasks.list_for_job(&job.id)?;
        if tasks.is_empty() {
            return Err(WorkError::permanent("no import tasks for job"));
        }

        if tasks.iter().all(|t| t.status == TaskStatus::Completed) {
            let updated =
                self.jobs
                    .apply(&job.id, job.status, JobUpdate::to(JobStatus::Imported))?;
            self.audit.record(
                NewAuditEvent::job(&job.id, event_types::JOB_STATUS_CHANGED)
                    .transition(job.status, updated.status)
                    .with_message("all imports completed"),
            );
            JOB_OUTCOMES.with_label_values(&["completed"]).inc();
            self.events.job_updated(&job.id);
            info!(job_id = %job.id, "Download job imported");
        } else if !tasks.iter().any(|t| t.status.is_active()) {
            let unsuccessful = tasks
                .iter()
                .filter(|t| t.status != TaskStatus::Completed)
                .count();
            let updated = self.jobs.apply(
                &job.id,
                job.status,
                JobUpdate::to(JobStatus::Failed).with_error("import failed", ErrorCategory::Permanent),
            )?;
            self.audit.record(
                NewAuditEvent::job(&job.id, event_types::JOB_FAILED)
                    .transition(job.status, updated.status)
                    .with_message("import failed")
                    .with_metadata(json!({ "unsuccessful_tasks": unsuccessful })),
            );
            JOB_OUTCOMES.with_label_values(&["failed"]).inc();
            self.events.job_updated(&job.id);
            warn!(job_id = %job.id, unsuccessful, "Download job failed during import");
        } else {
            // Still importing; release the lease so the next poll sees it again.
            self.jobs
                .apply(&job.id, job.status, JobUpdate::to(job.status))?;
        }
        Ok(())
    }

    fn handle_error(&self, job: &DownloadJob, error: WorkError) {
        let default_max = self
            .settings
            .jobs_max_attempts()
            .unwrap_or(FALLBACK_MAX_ATTEMPTS);

        match decide(&error, job.attempt_count, job.max_attempts, default_max, Utc::now()) {
            RetryDecision::Retry {
                attempt,
                next_run_at,
                delay,
            } => {
                let update = JobUpdate::to(job.status)
                    .retry(attempt, next_run_at)
                    .with_error(&error.message, error.category);
                if let Err(e) = self.jobs.apply(&job.id, job.status, update) {
                    warn!(job_id = %job.id, error = %e, "Failed to schedule job retry");
                    return;
                }
                self.audit.record(
                    NewAuditEvent::job(&job.id, event_types::JOB_RETRY_SCHEDULED)
                        .with_message(&error.message)
                        .with_metadata(json!({
                            "attempt": attempt,
                            "next_run_at": next_run_at.to_rfc3339(),
                            "backoff_secs": delay.as_secs(),
                        })),
                );
                JOB_OUTCOMES.with_label_values(&["retried"]).inc();
                self.events.job_updated(&job.id);
                warn!(
                    job_id = %job.id,
                    attempt,
                    backoff_secs = delay.as_secs(),
                    error = %error,
                    "Download job will be retried"
                );
            }
            RetryDecision::Fail { message } => {
                let update =
                    JobUpdate::to(JobStatus::Failed).with_error(&message, error.category);
                let updated = match self.jobs.apply(&job.id, job.status, update) {
                    Ok(updated) => updated,
                    Err(e) => {
                        warn!(job_id = %job.id, error = %e, "Failed to mark job failed");
                        return;
                    }
                };
                self.audit.record(
                    NewAuditEvent::job(&job.id, event_types::JOB_FAILED)
                        .transition(job.status, updated.status)
                        .with_message(&message)
                        .with_metadata(json!({ "category": error.category })),
                );
                JOB_OUTCOMES.with_label_values(&["failed"]).inc();
                self.events.job_updated(&job.id);
                warn!(job_id = %job.id, error = %message, "Download job failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{SqliteAuditStore, SubjectKind};
    use crate::downloader::DownloadFile;
    use crate::import::{SqliteImportTaskStore, TaskUpdate};
    use crate::job::{NewDownloadJob, SqliteJobStore};
    use crate::placer::ImportMethod;
    use crate::settings::SqliteSettingsStore;
    use crate::testing::MockDownloader;

    struct Harness {
        jobs: Arc<SqliteJobStore>,
        tasks: Arc<SqliteImportTaskStore>,
        downloader: Arc<MockDownloader>,
        audit: AuditLog,
        worker: JobWorker,
    }

    fn harness(downloader: MockDownloader) -> Harness {
        let jobs = Arc::new(SqliteJobStore::in_memory().unwrap());
        let tasks = Arc::new(SqliteImportTaskStore::in_memory().unwrap());
        let downloader = Arc::new(downloader);
        let mut registry = DownloaderRegistry::new();
        registry.register(downloader.clone(), true);
        let settings = Arc::new(SettingsService::new(Arc::new(
            SqliteSettingsStore::in_memory().unwrap(),
        )));
        let audit = AuditLog::new(Arc::new(SqliteAuditStore::in_memory().unwrap()));
        let worker = JobWorker::new(
            jobs.clone(),
            tasks.clone(),
            registry,
            settings,
            audit.clone(),
            EventPublisher::new(16),
        )
        .with_claim(10, Duration::from_secs(60));
        Harness {
            jobs,
            tasks,
            downloader,
            audit,
            worker,
        }
    }

    const HASH: &str = "0123456789abcdef0123456789abcdef01234567";

    fn new_job(media: MediaRef) -> NewDownloadJob {
        NewDownloadJob {
            indexer_id: 1,
            guid: "guid-1".to_string(),
            candidate_title: "Arrival.2016.1080p.BluRay.x264-GRP".to_string(),
            candidate_link: format!("magnet:?xt=urn:btih:{}&dn=Arrival", HASH),
            protocol: Protocol::Torrent,
            media,
            downloader_id: "qbit".to_string(),
            library_id: "movies".to_string(),
            name_template_id: "movie-default".to_string(),
            max_attempts: 3,
        }
    }

    fn create(h: &Harness, media: MediaRef) -> DownloadJob {
        h.jobs.create_unless_active(new_job(media)).unwrap().0
    }

    fn reload(h: &Harness, id: &str) -> DownloadJob {
        h.jobs.get(id).unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_pending_job_is_submitted() {
        let h = harness(MockDownloader::new("qbit"));
        let job = create(&h, MediaRef::movie("Arrival", Some(2016)));

        assert_eq!(h.worker.run_once().await.unwrap(), 1);

        let job = reload(&h, &job.id);
        assert_eq!(job.status, JobStatus::Enqueued);
        assert_eq!(job.external_id.as_deref(), Some(HASH));
        assert!(job.claimed_until.is_none());
        let added = h.downloader.added().await;
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].tags, vec![DOWNLOAD_TAG.to_string()]);

        let timeline = h.audit.timeline(SubjectKind::DownloadJob, &job.id).unwrap();
        assert_eq!(timeline[0].event_type, event_types::JOB_ENQUEUED);
    }

    #[tokio::test]
    async fn test_progress_then_hand_off_movie() {
        let h = harness(MockDownloader::new("qbit"));
        let job = create(&h, MediaRef::movie("Arrival", Some(2016)));
        h.worker.run_once().await.unwrap();

        h.downloader.set_status(HASH, ItemStatus::Downloading).await;
        h.downloader.set_progress(HASH, 0.4).await;
        h.worker.run_once().await.unwrap();
        let polled = reload(&h, &job.id);
        assert_eq!(polled.status, JobStatus::Downloading);
        assert!((polled.progress - 0.4).abs() < 1e-9);

        h.downloader.complete(HASH, "/dl", "/dl/Arrival").await;
        h.downloader
            .set_files(
                HASH,
                vec![
                    DownloadFile::new("Arrival/arrival.mkv", 8_000),
                    DownloadFile::new("Arrival/sample.mkv", 100),
                ],
            )
            .await;
        h.worker.run_once().await.unwrap();

        let job = reload(&h, &job.id);
        assert_eq!(job.status, JobStatus::Importing);
        assert_eq!(job.import_source_path.as_deref(), Some("/dl/Arrival/arrival.mkv"));
        let tasks = h.tasks.list_for_job(&job.id).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].source_path, "/dl/Arrival/arrival.mkv");
        assert_eq!(tasks[0].max_attempts, 5);
    }

    #[tokio::test]
    async fn test_hand_off_without_file_listing_uses_content_path() {
        let h = harness(MockDownloader::new("qbit").without_file_listing());
        let job = create(&h, MediaRef::movie("Arrival", Some(2016)));
        h.worker.run_once().await.unwrap();
        h.downloader.complete(HASH, "/dl", "/dl/arrival.mkv").await;
        h.worker.run_once().await.unwrap();

        let tasks = h.tasks.list_for_job(&job.id).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].source_path, "/dl/arrival.mkv");
    }

    #[tokio::test]
    async fn test_season_pack_creates_task_per_episode() {
        let h = harness(MockDownloader::new("qbit"));
        let job = create(&h, MediaRef::series("Dark", Some(2017)).with_episode(1, None));
        h.worker.run_once().await.unwrap();
        h.downloader.complete(HASH, "/dl", "/dl/Dark.S01").await;
        h.downloader
            .set_files(
                HASH,
                vec![
                    DownloadFile::new("Dark.S01/Dark.S01E01.mkv", 900),
                    DownloadFile::new("Dark.S01/Dark.S01E02.mkv", 900),
                ],
            )
            .await;
        h.worker.run_once().await.unwrap();

        let tasks = h.tasks.list_for_job(&job.id).unwrap();
        let episodes: Vec<_> = tasks.iter().map(|t| t.media.episode).collect();
        assert_eq!(episodes, vec![Some(1), Some(2)]);
    }

    #[tokio::test]
    async fn test_finalize_waits_then_imports() {
        let h = harness(MockDownloader::new("qbit").without_file_listing());
        let job = create(&h, MediaRef::movie("Arrival", Some(2016)));
        h.worker.run_once().await.unwrap();
        h.downloader.complete(HASH, "/dl", "/dl/arrival.mkv").await;
        h.worker.run_once().await.unwrap();

        // Task still pending: the job stays importing with its lease released.
        h.worker.run_once().await.unwrap();
        let waiting = reload(&h, &job.id);
        assert_eq!(waiting.status, JobStatus::Importing);
        assert!(waiting.claimed_until.is_none());

        let task = h.tasks.claim_runnable(1).unwrap().remove(0);
        h.tasks
            .apply(
                &task.id,
                TaskStatus::InProgress,
                TaskUpdate::to(TaskStatus::Completed)
                    .with_destination("/lib/Arrival.mkv", ImportMethod::Hardlink),
            )
            .unwrap();
        h.worker.run_once().await.unwrap();
        assert_eq!(reload(&h, &job.id).status, JobStatus::Imported);
    }

    #[tokio::test]
    async fn test_finalize_fails_when_imports_fail() {
        let h = harness(MockDownloader::new("qbit").without_file_listing());
        let job = create(&h, MediaRef::movie("Arrival", Some(2016)));
        h.worker.run_once().await.unwrap();
        h.downloader.complete(HASH, "/dl", "/dl/arrival.mkv").await;
        h.worker.run_once().await.unwrap();

        let task = h.tasks.claim_runnable(1).unwrap().remove(0);
        h.tasks
            .apply(
                &task.id,
                TaskStatus::InProgress,
                TaskUpdate::to(TaskStatus::Failed)
                    .with_error("source not found", ErrorCategory::Permanent),
            )
            .unwrap();
        h.worker.run_once().await.unwrap();

        let job = reload(&h, &job.id);
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.last_error.as_deref(), Some("import failed"));
    }

    #[tokio::test]
    async fn test_transient_error_schedules_retry() {
        let h = harness(MockDownloader::new("qbit"));
        let job = create(&h, MediaRef::movie("Arrival", Some(2016)));
        h.downloader
            .set_next_error(DownloaderError::ConnectionFailed("refused".into()))
            .await;

        h.worker.run_once().await.unwrap();

        let job = reload(&h, &job.id);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.attempt_count, 1);
        assert_eq!(job.error_category, Some(ErrorCategory::Transient));
        assert!(job.next_run_at > Utc::now());
        // Not runnable again until the backoff passes.
        assert_eq!(h.worker.run_once().await.unwrap(), 0);

        let timeline = h.audit.timeline(SubjectKind::DownloadJob, &job.id).unwrap();
        assert_eq!(timeline[0].event_type, event_types::JOB_RETRY_SCHEDULED);
        assert_eq!(timeline[0].metadata["attempt"], 1);
    }

    #[tokio::test]
    async fn test_errored_download_fails_permanently() {
        let h = harness(MockDownloader::new("qbit"));
        let job = create(&h, MediaRef::movie("Arrival", Some(2016)));
        h.worker.run_once().await.unwrap();
        h.downloader.set_status(HASH, ItemStatus::Errored).await;
        h.worker.run_once().await.unwrap();

        let job = reload(&h, &job.id);
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_category, Some(ErrorCategory::Permanent));
    }

    #[tokio::test]
    async fn test_unknown_downloader_fails() {
        let h = harness(MockDownloader::new("qbit"));
        let mut new = new_job(MediaRef::movie("Arrival", Some(2016)));
        new.downloader_id = "sab".to_string();
        let job = h.jobs.create_unless_active(new).unwrap().0;

        h.worker.run_once().await.unwrap();

        let job = reload(&h, &job.id);
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.last_error.as_deref(), Some("unknown downloader: sab"));
    }
}
