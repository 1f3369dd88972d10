//! Download job API handlers.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use snaggle_core::job::JobFilter;
use snaggle_core::{AuditRecord, DownloadJob, ImportTask, JobStatus};

use super::error::ApiError;
use super::{DEFAULT_LIMIT, MAX_LIMIT};
use crate::state::AppState;

/// Query parameters for listing jobs
#[derive(Debug, Deserialize)]
pub struct ListJobsParams {
    /// Filter by status
    pub status: Option<String>,
    /// Filter by downloader id
    pub downloader_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Response for listing jobs
#[derive(Debug, Serialize)]
pub struct ListJobsResponse {
    pub items: Vec<DownloadJob>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// List download jobs, newest first
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListJobsParams>,
) -> Result<Json<ListJobsResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = JobFilter::new().with_limit(limit).with_offset(offset);
    if let Some(ref status) = params.status {
        let status: JobStatus = status.parse().map_err(ApiError::bad_request)?;
        filter = filter.with_status(status);
    }
    if let Some(ref downloader_id) = params.downloader_id {
        filter = filter.with_downloader(downloader_id);
    }

    let (items, total) = state.jobs().list(&filter)?;
    Ok(Json(ListJobsResponse {
        items,
        total,
        limit,
        offset,
    }))
}

pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DownloadJob>, ApiError> {
    Ok(Json(state.jobs().get(&id)?))
}

/// Cancel a job and its pending import tasks
pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DownloadJob>, ApiError> {
    Ok(Json(state.jobs().cancel_job(&id)?))
}

/// Audit rows for a job, oldest first
pub async fn job_timeline(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<AuditRecord>>, ApiError> {
    Ok(Json(state.jobs().timeline(&id)?))
}

/// Import tasks created for a job
pub async fn job_tasks(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ImportTask>>, ApiError> {
    Ok(Json(state.jobs().tasks_for(&id)?))
}
