//! Download jobs: durable acquisition attempts.

mod service;
mod sqlite_store;
mod store;
mod types;

pub use service::JobService;
pub use sqlite_store::SqliteJobStore;
pub use store::{JobError, JobFilter, JobStore};
pub use types::{DownloadJob, JobStatus, JobUpdate, NewDownloadJob};
