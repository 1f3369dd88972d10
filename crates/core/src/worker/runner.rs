//! Background loops driving the job and import workers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{error, info, warn};

use super::{ImportWorker, JobWorker};
use crate::import::ImportTaskStore;

/// In-progress imports untouched for this long are assumed to belong to a
/// process that died mid-import.
const DEFAULT_STALE_IMPORT_AGE: Duration = Duration::from_secs(60 * 60);

pub struct WorkerRunner {
    job_worker: Arc<JobWorker>,
    import_worker: Arc<ImportWorker>,
    tasks: Arc<dyn ImportTaskStore>,
    job_interval: Duration,
    import_interval: Duration,
    stale_import_age: Option<Duration>,

    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl WorkerRunner {
    pub fn new(
        job_worker: Arc<JobWorker>,
        import_worker: Arc<ImportWorker>,
        tasks: Arc<dyn ImportTaskStore>,
        job_interval: Duration,
        import_interval: Duration,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            job_worker,
            import_worker,
            tasks,
            job_interval,
            import_interval,
            stale_import_age: Some(DEFAULT_STALE_IMPORT_AGE),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Age after which `start` returns in-progress imports to pending. `None`
    /// skips the reset, for deployments where another process may still be
    /// mid-copy.
    pub fn with_stale_import_age(mut self, age: Option<Duration>) -> Self {
        self.stale_import_age = age;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Recover stale imports and spawn both loops.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Workers already running");
            return;
        }

        if let Some(age) = self.stale_import_age {
            match self.tasks.reset_stale(age) {
                Ok(0) => {}
                Ok(n) => info!(count = n, "Returned stale import tasks to pending"),
                Err(e) => error!(error = %e, "Failed to reset stale import tasks"),
            }
        }

        self.spawn_job_loop();
        self.spawn_import_loop();
        info!("Workers started");
    }

    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Workers not running");
            return;
        }
        let _ = self.shutdown_tx.send(());
        info!("Workers stopping");
    }

    fn spawn_job_loop(&self) {
        let running = Arc::clone(&self.running);
        let worker = Arc::clone(&self.job_worker);
        let interval = self.job_interval;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Job loop started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = tokio::time::sleep(interval) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        if let Err(e) = worker.run_once().await {
                            warn!(error = %e, "Job poll failed");
                        }
                    }
                }
            }
            info!("Job loop stopped");
        });
    }

    fn spawn_import_loop(&self) {
        let running = Arc::clone(&self.running);
        let worker = Arc::clone(&self.import_worker);
        let interval = self.import_interval;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Import loop started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = tokio::time::sleep(interval) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        if let Err(e) = worker.run_once().await {
                            warn!(error = %e, "Import poll failed");
                        }
                    }
                }
            }
            info!("Import loop stopped");
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditLog, SqliteAuditStore};
    use crate::config::Config;
    use crate::downloader::DownloaderRegistry;
    use crate::events::EventPublisher;
    use crate::candidate::MediaRef;
    use crate::import::{
        NewImportTask, SqliteImportTaskStore, SqliteMediaCatalog, TaskStatus, TaskUpdate,
    };
    use crate::job::SqliteJobStore;
    use crate::settings::{SettingsService, SqliteSettingsStore};
    use crate::testing::MockPlacer;

    fn runner() -> (WorkerRunner, Arc<SqliteImportTaskStore>) {
        let jobs = Arc::new(SqliteJobStore::in_memory().unwrap());
        let tasks = Arc::new(SqliteImportTaskStore::in_memory().unwrap());
        let settings = Arc::new(SettingsService::new(Arc::new(
            SqliteSettingsStore::in_memory().unwrap(),
        )));
        let audit = AuditLog::new(Arc::new(SqliteAuditStore::in_memory().unwrap()));
        let events = EventPublisher::new(4);
        let job_worker = JobWorker::new(
            jobs.clone(),
            tasks.clone(),
            DownloaderRegistry::new(),
            settings.clone(),
            audit.clone(),
            events.clone(),
        );
        let import_worker = ImportWorker::new(
            tasks.clone(),
            jobs,
            DownloaderRegistry::new(),
            Arc::new(MockPlacer::new()),
            Arc::new(SqliteMediaCatalog::in_memory().unwrap()),
            Arc::new(Config::default()),
            settings,
            audit,
            events,
        );
        let runner = WorkerRunner::new(
            Arc::new(job_worker),
            Arc::new(import_worker),
            tasks.clone(),
            Duration::from_secs(60),
            Duration::from_secs(60),
        );
        (runner, tasks)
    }

    /// A task left in progress, as if a worker had claimed it.
    fn in_progress_task(tasks: &SqliteImportTaskStore) -> String {
        let task = tasks
            .create(NewImportTask {
                download_job_id: None,
                source_path: "/downloads/arrival.mkv".to_string(),
                media: MediaRef::movie("Arrival", Some(2016)),
                library_id: "movies".to_string(),
                name_template_id: "movie-default".to_string(),
                candidate_title: "Arrival.2016.1080p.BluRay.x264-GRP".to_string(),
                max_attempts: 5,
            })
            .unwrap();
        tasks
            .apply(&task.id, TaskStatus::Pending, TaskUpdate::to(TaskStatus::InProgress))
            .unwrap();
        task.id
    }

    #[tokio::test]
    async fn test_start_resets_stale_imports() {
        let (runner, tasks) = runner();
        let id = in_progress_task(&tasks);

        let runner = runner.with_stale_import_age(Some(Duration::ZERO));
        runner.start();
        runner.stop();

        assert_eq!(tasks.get(&id).unwrap().unwrap().status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn test_stale_reset_can_be_disabled() {
        let (runner, tasks) = runner();
        let id = in_progress_task(&tasks);

        let runner = runner.with_stale_import_age(None);
        runner.start();
        runner.stop();

        assert_eq!(
            tasks.get(&id).unwrap().unwrap().status,
            TaskStatus::InProgress
        );
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let (runner, _) = runner();
        assert!(!runner.is_running());

        runner.start();
        assert!(runner.is_running());
        // Second start is a no-op.
        runner.start();
        tokio::time::sleep(Duration::from_millis(30)).await;

        runner.stop();
        assert!(!runner.is_running());
    }
}
