//! Background workers for download jobs and import tasks.
//!
//! Both workers follow the same shape: claim a batch of due rows from their
//! store, perform one step of side effects per row, then write the outcome
//! back with a conditional transition. Failures are categorized as transient
//! (retried with exponential backoff) or permanent (fail immediately).

mod backoff;
mod error;
mod import_worker;
mod job_worker;
mod runner;
mod sources;

pub use backoff::{backoff_delay, decide, RetryDecision};
pub use error::{ErrorCategory, WorkError};
pub use import_worker::ImportWorker;
pub use job_worker::JobWorker;
pub use runner::WorkerRunner;
pub use sources::{find_source, resolve_file_path, select_sources};
