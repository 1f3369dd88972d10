pub mod audit;
pub mod candidate;
pub mod config;
pub mod db;
pub mod downloader;
pub mod events;
pub mod import;
pub mod job;
pub mod metrics;
pub mod placer;
pub mod policy;
pub mod release;
pub mod render;
pub mod settings;
pub mod testing;
pub mod worker;

pub use audit::{AuditLog, AuditRecord, SqliteAuditStore, SubjectKind};
pub use candidate::{CandidateError, CandidateService, DownloadCandidate, MediaRef, SearchResult};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use downloader::{Downloader, DownloaderError, DownloaderRegistry};
pub use events::{ChangeEvent, ChangeType, EventPublisher};
pub use import::{ImportService, ImportTask, ImportTaskStore, SqliteImportTaskStore, TaskStatus};
pub use job::{DownloadJob, JobService, JobStatus, JobStore, SqliteJobStore};
pub use policy::{Policy, PolicyEngine, SqlitePolicyStore};
pub use release::{ParseResult, QualityInfo, ReleaseInfo};
pub use settings::{SettingsService, SqliteSettingsStore};
pub use worker::{ImportWorker, JobWorker, WorkerRunner};
