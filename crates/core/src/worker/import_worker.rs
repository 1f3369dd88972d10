//! Places downloaded files into libraries.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};

use super::sources::{find_source, resolve_file_path};
use super::{decide, RetryDecision, WorkError};
use crate::audit::{event_types, AuditLog, NewAuditEvent};
use crate::candidate::{EvaluationContext, MediaType};
use crate::config::Config;
use crate::downloader::DownloaderRegistry;
use crate::events::EventPublisher;
use crate::import::{
    ensure_extension, ImportError, ImportTask, ImportTaskStore, MediaCatalog, NewMediaFile,
    TaskStatus, TaskUpdate,
};
use crate::job::{DownloadJob, JobStore};
use crate::metrics::{IMPORT_METHODS, ROWS_CLAIMED, TASK_OUTCOMES};
use crate::placer::{FilePlacement, PlacedFile, Placer};
use crate::render::render;
use crate::settings::SettingsService;

const FALLBACK_MAX_ATTEMPTS: u32 = 5;

pub struct ImportWorker {
    tasks: Arc<dyn ImportTaskStore>,
    jobs: Arc<dyn JobStore>,
    downloaders: DownloaderRegistry,
    placer: Arc<dyn Placer>,
    catalog: Arc<dyn MediaCatalog>,
    config: Arc<Config>,
    settings: Arc<SettingsService>,
    audit: AuditLog,
    events: EventPublisher,
    claim_limit: usize,
}

impl ImportWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tasks: Arc<dyn ImportTaskStore>,
        jobs: Arc<dyn JobStore>,
        downloaders: DownloaderRegistry,
        placer: Arc<dyn Placer>,
        catalog: Arc<dyn MediaCatalog>,
        config: Arc<Config>,
        settings: Arc<SettingsService>,
        audit: AuditLog,
        events: EventPublisher,
    ) -> Self {
        let claim_limit = config.workers.import_claim_limit;
        Self {
            tasks,
            jobs,
            downloaders,
            placer,
            catalog,
            config,
            settings,
            audit,
            events,
            claim_limit,
        }
    }

    /// Claim one batch of pending tasks and import each. Returns the batch size.
    pub async fn run_once(&self) -> Result<usize, ImportError> {
        let claimed = self.tasks.claim_runnable(self.claim_limit)?;
        if claimed.is_empty() {
            return Ok(0);
        }
        ROWS_CLAIMED
            .with_label_values(&["import"])
            .inc_by(claimed.len() as u64);
        debug!(count = claimed.len(), "Claimed import tasks");

        for task in &claimed {
            self.audit.record(
                NewAuditEvent::task(&task.id, event_types::TASK_STARTED)
                    .transition(TaskStatus::Pending, task.status)
                    .with_metadata(json!({ "attempt": task.attempt_count + 1 })),
            );
            self.publish(task);

            if let Err(e) = self.process(task).await {
                self.handle_error(task, e);
            }
        }
        Ok(claimed.len())
    }

    fn publish(&self, task: &ImportTask) {
        self.events.task_updated(&task.id);
        if let Some(job_id) = &task.download_job_id {
            self.events.job_updated(job_id);
        }
    }

    async fn process(&self, task: &ImportTask) -> Result<(), WorkError> {
        let job = match &task.download_job_id {
            Some(id) => self.jobs.get(id)?,
            None => None,
        };

        let source = PathBuf::from(self.heal_source(task, job.as_ref()).await?);
        match tokio::fs::metadata(&source).await {
            Ok(meta) if meta.is_dir() => {
                return Err(WorkError::permanent(format!(
                    "source is a directory: {}",
                    source.display()
                )))
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(WorkError::permanent(format!(
                    "source not found: {}",
                    source.display()
                )))
            }
            Err(e) => return Err(e.into()),
        }

        let (library_root, destination) = self.destination(task, job.as_ref(), &source)?;
        let overwrite = task.is_reimport();
        if !overwrite && tokio::fs::try_exists(&destination).await? {
            return Err(WorkError::permanent(format!(
                "destination already exists: {}",
                destination.display()
            )));
        }

        let verify = self
            .settings
            .verify_copies()?
            .then_some(self.config.placer.checksum_type);
        let placed = self
            .placer
            .place(
                FilePlacement::new(&source, &destination)
                    .with_overwrite(overwrite)
                    .with_verification(verify),
            )
            .await?;

        self.record_in_catalog(task, &library_root, &placed);

        let dest_path = placed.destination.to_string_lossy().into_owned();
        let updated = self.tasks.apply(
            &task.id,
            TaskStatus::InProgress,
            TaskUpdate::to(TaskStatus::Completed).with_destination(&dest_path, placed.method),
        )?;
        self.audit.record(
            NewAuditEvent::task(&task.id, event_types::TASK_COMPLETED)
                .transition(task.status, updated.status)
                .with_metadata(json!({
                    "dest_path": dest_path,
                    "method": placed.method,
                    "size_bytes": placed.size_bytes,
                    "checksum": placed.checksum,
                })),
        );
        IMPORT_METHODS
            .with_label_values(&[placed.method.as_str()])
            .inc();
        TASK_OUTCOMES.with_label_values(&["completed"]).inc();
        self.publish(&updated);
        info!(
            task_id = %task.id,
            destination = %dest_path,
            method = %placed.method,
            "Import completed"
        );
        Ok(())
    }

    /// Re-resolve the source against the downloader's current view of the
    /// download. The stored path is kept when the downloader cannot say.
    async fn heal_source(
        &self,
        task: &ImportTask,
        job: Option<&DownloadJob>,
    ) -> Result<String, WorkError> {
        let stored = task.source_path.clone();
        let Some(job) = job else {
            return Ok(stored);
        };
        let (Some(external_id), Some(downloader)) = (
            job.external_id.as_deref(),
            self.downloaders.get(&job.downloader_id),
        ) else {
            return Ok(stored);
        };
        // Episode-less series tasks point at the whole payload.
        if task.media.media_type == MediaType::Series && task.media.episode.is_none() {
            return Ok(stored);
        }

        let files = match downloader.list_files(external_id).await {
            Ok(files) if !files.is_empty() => files,
            Ok(_) => return Ok(stored),
            Err(e) => {
                debug!(task_id = %task.id, error = %e, "Keeping stored source path");
                return Ok(stored);
            }
        };
        let Some(file) = find_source(&task.media, &files) else {
            debug!(task_id = %task.id, "No listed file matches, keeping stored source path");
            return Ok(stored);
        };

        let item = downloader.get(external_id).await.ok();
        let save_path = item
            .as_ref()
            .and_then(|i| i.save_path.clone())
            .or_else(|| job.save_path.clone());
        let content_path = item
            .as_ref()
            .and_then(|i| i.content_path.clone())
            .or_else(|| job.content_path.clone());
        let Some(resolved) =
            resolve_file_path(&file.path, save_path.as_deref(), content_path.as_deref())
        else {
            return Ok(stored);
        };
        if resolved == stored {
            return Ok(stored);
        }

        self.tasks.apply(
            &task.id,
            TaskStatus::InProgress,
            TaskUpdate::to(TaskStatus::InProgress).with_source(&resolved),
        )?;
        self.audit.record(
            NewAuditEvent::task(&task.id, event_types::TASK_SOURCE_HEALED).with_metadata(json!({
                "old_source_path": stored,
                "new_source_path": resolved,
            })),
        );
        info!(task_id = %task.id, from = %stored, to = %resolved, "Import source path updated");
        Ok(resolved)
    }

    /// Library root and absolute destination for `source`.
    fn destination(
        &self,
        task: &ImportTask,
        job: Option<&DownloadJob>,
        source: &Path,
    ) -> Result<(PathBuf, PathBuf), WorkError> {
        let library = self.config.library(&task.library_id).ok_or_else(|| {
            WorkError::permanent(format!("unknown library: {}", task.library_id))
        })?;
        let template = self
            .config
            .name_template(&task.name_template_id)
            .ok_or_else(|| {
                WorkError::permanent(format!("unknown name template: {}", task.name_template_id))
            })?;

        let protocol = job.map(|j| j.protocol).unwrap_or_default();
        let ctx = EvaluationContext::from_stored(&task.candidate_title, protocol, task.media.clone());
        let rendered = render(&template.path_template(), &ctx)?;
        let destination = ensure_extension(&library.root_path.join(&rendered), source);
        Ok((library.root_path.clone(), destination))
    }

    fn record_in_catalog(&self, task: &ImportTask, library_root: &Path, placed: &PlacedFile) {
        let rel_path = placed
            .destination
            .strip_prefix(library_root)
            .unwrap_or(&placed.destination)
            .to_string_lossy()
            .into_owned();
        let entry = NewMediaFile {
            library_id: task.library_id.clone(),
            media_id: task.media.catalog_id(),
            season: task.media.season,
            episode: task.media.episode,
            rel_path,
            import_task_id: task.id.clone(),
            method: placed.method,
            size_bytes: placed.size_bytes,
        };
        if let Err(e) = self.catalog.record(entry) {
            warn!(task_id = %task.id, error = %e, "Failed to record imported file in catalog");
            self.audit.record(
                NewAuditEvent::task(&task.id, event_types::TASK_CATALOG_FAILED)
                    .with_message(e.to_string()),
            );
        }
    }

    fn handle_error(&self, task: &ImportTask, error: WorkError) {
        let default_max = self
            .settings
            .imports_max_attempts()
            .unwrap_or(FALLBACK_MAX_ATTEMPTS);

        let (update, event_type, message) =
            match decide(&error, task.attempt_count, task.max_attempts, default_max, Utc::now()) {
                RetryDecision::Retry {
                    attempt,
                    next_run_at,
                    delay,
                } => {
                    warn!(
                        task_id = %task.id,
                        attempt,
                        backoff_secs = delay.as_secs(),
                        error = %error,
                        "Import will be retried"
                    );
                    (
                        TaskUpdate::to(TaskStatus::Pending)
                            .retry(attempt, next_run_at)
                            .with_error(&error.message, error.category),
                        event_types::TASK_RETRY_SCHEDULED,
                        error.message.clone(),
                    )
                }
                RetryDecision::Fail { message } => {
                    warn!(task_id = %task.id, error = %message, "Import failed");
                    (
                        TaskUpdate::to(TaskStatus::Failed).with_error(&message, error.category),
                        event_types::TASK_FAILED,
                        message,
                    )
                }
            };

        let outcome = if update.status == TaskStatus::Pending {
            "retried"
        } else {
            "failed"
        };
        let metadata = json!({
            "category": error.category,
            "attempt": update.attempt_count,
            "next_run_at": update.next_run_at.map(|t| t.to_rfc3339()),
        });
        match self.tasks.apply(&task.id, TaskStatus::InProgress, update) {
            Ok(updated) => {
                self.audit.record(
                    NewAuditEvent::task(&task.id, event_type)
                        .transition(task.status, updated.status)
                        .with_message(message)
                        .with_metadata(metadata),
                );
                TASK_OUTCOMES.with_label_values(&[outcome]).inc();
                self.publish(&updated);
            }
            Err(e) => warn!(task_id = %task.id, error = %e, "Failed to record import failure"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{SqliteAuditStore, SubjectKind};
    use crate::candidate::{MediaRef, Protocol};
    use crate::config::{LibraryConfig, NameTemplateConfig};
    use crate::downloader::DownloadFile;
    use crate::import::{NewImportTask, SqliteImportTaskStore, SqliteMediaCatalog};
    use crate::job::{JobStatus, JobUpdate, NewDownloadJob, SqliteJobStore};
    use crate::placer::{FsPlacer, ImportMethod, PlacerConfig};
    use crate::settings::SqliteSettingsStore;
    use crate::testing::MockDownloader;
    use crate::worker::ErrorCategory;
    use tempfile::TempDir;

    struct Harness {
        dir: TempDir,
        tasks: Arc<SqliteImportTaskStore>,
        jobs: Arc<SqliteJobStore>,
        catalog: Arc<SqliteMediaCatalog>,
        downloader: Arc<MockDownloader>,
        audit: AuditLog,
        worker: ImportWorker,
    }

    fn config(library_root: PathBuf) -> Config {
        Config {
            libraries: vec![LibraryConfig {
                id: "movies".to_string(),
                name: "Movies".to_string(),
                media_type: MediaType::Movie,
                root_path: library_root,
                default: true,
            }],
            name_templates: vec![NameTemplateConfig {
                id: "movie-default".to_string(),
                name: String::new(),
                media_type: MediaType::Movie,
                template: "{{ media.title }} ({{ media.year }})".to_string(),
                movie_dir_template: Some("{{ media.title }} ({{ media.year }})".to_string()),
                series_show_template: None,
                series_season_template: None,
                default: true,
            }],
            ..Config::default()
        }
    }

    fn harness() -> Harness {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("downloads")).unwrap();
        let tasks = Arc::new(SqliteImportTaskStore::in_memory().unwrap());
        let jobs = Arc::new(SqliteJobStore::in_memory().unwrap());
        let catalog = Arc::new(SqliteMediaCatalog::in_memory().unwrap());
        let downloader = Arc::new(MockDownloader::new("qbit"));
        let mut registry = DownloaderRegistry::new();
        registry.register(downloader.clone(), true);
        let settings = Arc::new(SettingsService::new(Arc::new(
            SqliteSettingsStore::in_memory().unwrap(),
        )));
        let audit = AuditLog::new(Arc::new(SqliteAuditStore::in_memory().unwrap()));
        let worker = ImportWorker::new(
            tasks.clone(),
            jobs.clone(),
            registry,
            Arc::new(FsPlacer::new(PlacerConfig::default())),
            catalog.clone(),
            Arc::new(config(dir.path().join("library"))),
            settings,
            audit.clone(),
            EventPublisher::new(16),
        );
        Harness {
            dir,
            tasks,
            jobs,
            catalog,
            downloader,
            audit,
            worker,
        }
    }

    fn write_source(h: &Harness, name: &str) -> String {
        let path = h.dir.path().join("downloads").join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, b"video payload").unwrap();
        path.to_string_lossy().into_owned()
    }

    fn new_task(source: &str, job_id: Option<String>) -> NewImportTask {
        NewImportTask {
            download_job_id: job_id,
            source_path: source.to_string(),
            media: MediaRef::movie("Arrival", Some(2016)),
            library_id: "movies".to_string(),
            name_template_id: "movie-default".to_string(),
            candidate_title: "Arrival.2016.1080p.BluRay.x264-GRP".to_string(),
            max_attempts: 3,
        }
    }

    fn expected_destination(h: &Harness) -> PathBuf {
        h.dir
            .path()
            .join("library/Arrival (2016)/Arrival (2016).mkv")
    }

    #[tokio::test]
    async fn test_import_places_file_and_records_catalog() {
        let h = harness();
        let source = write_source(&h, "arrival.mkv");
        let task = h.tasks.create(new_task(&source, None)).unwrap();

        assert_eq!(h.worker.run_once().await.unwrap(), 1);

        let task = h.tasks.get(&task.id).unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        let dest = expected_destination(&h);
        assert_eq!(task.dest_path.as_deref(), Some(dest.to_string_lossy().as_ref()));
        assert_eq!(task.import_method, Some(ImportMethod::Hardlink));
        assert_eq!(std::fs::read(&dest).unwrap(), b"video payload");

        let entry = h
            .catalog
            .get_by_path("movies", "Arrival (2016)/Arrival (2016).mkv")
            .unwrap()
            .unwrap();
        assert_eq!(entry.import_task_id, task.id);

        let events: Vec<_> = h
            .audit
            .timeline(SubjectKind::ImportTask, &task.id)
            .unwrap()
            .into_iter()
            .map(|e| e.event_type)
            .collect();
        assert_eq!(
            events,
            vec![event_types::TASK_STARTED, event_types::TASK_COMPLETED]
        );
    }

    #[tokio::test]
    async fn test_missing_source_fails_permanently() {
        let h = harness();
        let missing = h.dir.path().join("downloads/gone.mkv");
        let task = h
            .tasks
            .create(new_task(&missing.to_string_lossy(), None))
            .unwrap();

        h.worker.run_once().await.unwrap();

        let task = h.tasks.get(&task.id).unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error_category, Some(ErrorCategory::Permanent));
        assert!(task.last_error.unwrap().starts_with("source not found"));
    }

    #[tokio::test]
    async fn test_existing_destination_blocks_import_but_not_reimport() {
        let h = harness();
        let source = write_source(&h, "arrival.mkv");
        let dest = expected_destination(&h);
        std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
        std::fs::write(&dest, b"old").unwrap();

        let task = h.tasks.create(new_task(&source, None)).unwrap();
        h.worker.run_once().await.unwrap();
        let failed = h.tasks.get(&task.id).unwrap().unwrap();
        assert_eq!(failed.status, TaskStatus::Failed);
        assert!(failed
            .last_error
            .unwrap()
            .starts_with("destination already exists"));

        let again = h.tasks.reimport(&task.id).unwrap();
        h.worker.run_once().await.unwrap();
        let again = h.tasks.get(&again.id).unwrap().unwrap();
        assert_eq!(again.status, TaskStatus::Completed);
        assert_eq!(std::fs::read(&dest).unwrap(), b"video payload");
    }

    #[tokio::test]
    async fn test_source_is_healed_from_downloader() {
        let h = harness();
        let moved = write_source(&h, "moved/Arrival/arrival.mkv");
        let hash = "feedfacefeedfacefeedfacefeedfacefeedface";

        let job = h
            .jobs
            .create_unless_active(NewDownloadJob {
                indexer_id: 1,
                guid: "g".to_string(),
                candidate_title: "Arrival.2016.1080p.BluRay.x264-GRP".to_string(),
                candidate_link: format!("magnet:?xt=urn:btih:{}", hash),
                protocol: Protocol::Torrent,
                media: MediaRef::movie("Arrival", Some(2016)),
                downloader_id: "qbit".to_string(),
                library_id: "movies".to_string(),
                name_template_id: "movie-default".to_string(),
                max_attempts: 3,
            })
            .unwrap()
            .0;
        h.jobs
            .apply(
                &job.id,
                JobStatus::Pending,
                JobUpdate::to(JobStatus::Enqueued).with_external_id(hash),
            )
            .unwrap();

        let save_path = h.dir.path().join("downloads/moved");
        h.downloader
            .insert_item(crate::downloader::DownloadItem {
                external_id: hash.to_string(),
                name: "Arrival".to_string(),
                status: crate::downloader::ItemStatus::Seeding,
                progress: 1.0,
                save_path: Some(save_path.to_string_lossy().into_owned()),
                content_path: None,
                added_at: None,
            })
            .await;
        h.downloader
            .set_files(hash, vec![DownloadFile::new("Arrival/arrival.mkv", 13)])
            .await;

        let stale = h.dir.path().join("downloads/Arrival/arrival.mkv");
        let task = h
            .tasks
            .create(new_task(&stale.to_string_lossy(), Some(job.id.clone())))
            .unwrap();
        h.worker.run_once().await.unwrap();

        let task = h.tasks.get(&task.id).unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.source_path, moved);
        let timeline = h.audit.timeline(SubjectKind::ImportTask, &task.id).unwrap();
        assert!(timeline
            .iter()
            .any(|e| e.event_type == event_types::TASK_SOURCE_HEALED));
    }

    #[tokio::test]
    async fn test_placer_io_error_is_retried() {
        use crate::placer::PlacerError;
        use crate::testing::MockPlacer;

        let h = harness();
        let placer = Arc::new(MockPlacer::new());
        placer
            .set_next_error(PlacerError::Io(std::io::Error::other("disk busy")))
            .await;
        let worker = ImportWorker::new(
            h.tasks.clone(),
            h.jobs.clone(),
            DownloaderRegistry::new(),
            placer.clone(),
            h.catalog.clone(),
            Arc::new(config(h.dir.path().join("library"))),
            Arc::new(SettingsService::new(Arc::new(
                SqliteSettingsStore::in_memory().unwrap(),
            ))),
            h.audit.clone(),
            EventPublisher::new(4),
        );
        let source = write_source(&h, "arrival.mkv");
        let task = h.tasks.create(new_task(&source, None)).unwrap();

        worker.run_once().await.unwrap();

        let task = h.tasks.get(&task.id).unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.attempt_count, 1);
        assert_eq!(task.error_category, Some(ErrorCategory::Transient));
        assert!(task.next_run_at > Utc::now());
    }
}
