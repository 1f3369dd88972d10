//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Workers (claimed rows, job and task outcomes)
//! - Imports (placement methods)
//! - Candidate cache (hits, misses)

use once_cell::sync::Lazy;
use prometheus::{IntCounterVec, Opts};

// =============================================================================
// Workers
// =============================================================================

/// Rows claimed by a worker poll.
pub static ROWS_CLAIMED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("snaggle_rows_claimed_total", "Total rows claimed by workers"),
        &["worker"], // "job", "import"
    )
    .unwrap()
});

/// Download job outcomes.
pub static JOB_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("snaggle_job_outcomes_total", "Download job processing outcomes"),
        &["outcome"], // "completed", "retried", "failed"
    )
    .unwrap()
});

/// Import task outcomes.
pub static TASK_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("snaggle_task_outcomes_total", "Import task processing outcomes"),
        &["outcome"], // "completed", "retried", "failed"
    )
    .unwrap()
});

// =============================================================================
// Imports
// =============================================================================

/// Files imported by placement method.
pub static IMPORT_METHODS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("snaggle_import_methods_total", "Files imported by method"),
        &["method"], // "hardlink", "copy"
    )
    .unwrap()
});

// =============================================================================
// Candidate cache
// =============================================================================

/// Candidate cache lookups by result.
pub static CANDIDATE_CACHE_LOOKUPS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "snaggle_candidate_cache_lookups_total",
            "Candidate cache lookups",
        ),
        &["result"], // "hit", "miss", "expired"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(ROWS_CLAIMED.clone()),
        Box::new(JOB_OUTCOMES.clone()),
        Box::new(TASK_OUTCOMES.clone()),
        Box::new(IMPORT_METHODS.clone()),
        Box::new(CANDIDATE_CACHE_LOOKUPS.clone()),
    ]
}
