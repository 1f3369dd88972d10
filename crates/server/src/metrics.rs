//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the snaggle server:
//! - HTTP request metrics (latency, counts)
//! - WebSocket connection metrics
//! - Job and import task counts by status (collected on scrape)
//!
//! Worker and cache counters live in `snaggle_core::metrics` and are
//! registered here alongside the server's own.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry, TextEncoder,
};
use regex_lite::Regex;
use snaggle_core::import::{TaskFilter, TaskStatus};
use snaggle_core::job::{JobFilter, JobStatus};

use crate::state::AppState;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "snaggle_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("snaggle_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "snaggle_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// WebSocket Metrics
// =============================================================================

/// Active WebSocket connections.
pub static WS_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "snaggle_ws_connections_active",
        "Number of active WebSocket connections",
    )
    .unwrap()
});

/// Total WebSocket connections (cumulative).
pub static WS_CONNECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "snaggle_ws_connections_total",
        "Total WebSocket connections since startup",
    )
    .unwrap()
});

/// WebSocket messages sent by type.
pub static WS_MESSAGES_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("snaggle_ws_messages_sent_total", "WebSocket messages sent"),
        &["type"],
    )
    .unwrap()
});

/// WebSocket lag events (when client falls behind).
pub static WS_LAG_EVENTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "snaggle_ws_lag_events_total",
        "WebSocket lag events (client fell behind)",
    )
    .unwrap()
});

// =============================================================================
// Pipeline gauges (collected dynamically)
// =============================================================================

/// Download jobs by current status.
pub static JOBS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("snaggle_jobs_by_status", "Current download job count by status"),
        &["status"],
    )
    .unwrap()
});

/// Import tasks by current status.
pub static TASKS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("snaggle_tasks_by_status", "Current import task count by status"),
        &["status"],
    )
    .unwrap()
});

/// Candidates currently cached.
pub static CANDIDATES_CACHED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "snaggle_candidates_cached",
        "Number of candidates in the candidate cache",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // WebSocket
    registry
        .register(Box::new(WS_CONNECTIONS_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(WS_CONNECTIONS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(WS_MESSAGES_SENT.clone()))
        .unwrap();
    registry.register(Box::new(WS_LAG_EVENTS.clone())).unwrap();

    // Pipeline
    registry.register(Box::new(JOBS_BY_STATUS.clone())).unwrap();
    registry
        .register(Box::new(TASKS_BY_STATUS.clone()))
        .unwrap();
    registry
        .register(Box::new(CANDIDATES_CACHED.clone()))
        .unwrap();

    // Core metrics (workers, imports, candidate cache)
    for metric in snaggle_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Refresh the gauges that mirror stored state.
///
/// Called before encoding so a scrape sees current counts.
pub fn collect_dynamic_metrics(state: &AppState) {
    CANDIDATES_CACHED.set(state.candidates().cache().len() as i64);

    for status in JobStatus::ALL {
        let filter = JobFilter::new().with_status(status).with_limit(1);
        if let Ok((_, total)) = state.jobs().list(&filter) {
            JOBS_BY_STATUS
                .with_label_values(&[status.as_str()])
                .set(total);
        }
    }

    for status in TaskStatus::ALL {
        let filter = TaskFilter::new().with_status(status).with_limit(1);
        if let Ok((_, total)) = state.imports().list(&filter) {
            TASKS_BY_STATUS
                .with_label_values(&[status.as_str()])
                .set(total);
        }
    }
}

static UUID_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .expect("valid uuid regex")
});

static NUMERIC_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/\d+(/|$)").expect("valid numeric regex"));

static CANDIDATE_GUID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(/api/v1/candidates/\{id\})/[^/]+").expect("valid candidate regex")
});

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let result = UUID_SEGMENT.replace_all(path, "{id}");
    let result = NUMERIC_SEGMENT.replace_all(&result, "/{id}$1");
    // Candidate guids are arbitrary indexer strings.
    let result = CANDIDATE_GUID.replace(&result, "$1/{guid}");
    result.to_string()
}
