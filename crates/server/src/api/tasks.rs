//! Import task API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use snaggle_core::import::TaskFilter;
use snaggle_core::{AuditRecord, ImportTask, TaskStatus};

use super::error::ApiError;
use super::{DEFAULT_LIMIT, MAX_LIMIT};
use crate::state::AppState;

/// Query parameters for listing import tasks
#[derive(Debug, Deserialize)]
pub struct ListTasksParams {
    /// Filter by status
    pub status: Option<String>,
    /// Filter by owning download job
    pub job_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Response for listing import tasks
#[derive(Debug, Serialize)]
pub struct ListTasksResponse {
    pub items: Vec<ImportTask>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListTasksParams>,
) -> Result<Json<ListTasksResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = TaskFilter::new().with_limit(limit).with_offset(offset);
    if let Some(ref status) = params.status {
        let status: TaskStatus = status.parse().map_err(ApiError::bad_request)?;
        filter = filter.with_status(status);
    }
    if let Some(ref job_id) = params.job_id {
        filter = filter.with_job(job_id);
    }

    let (items, total) = state.imports().list(&filter)?;
    Ok(Json(ListTasksResponse {
        items,
        total,
        limit,
        offset,
    }))
}

pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ImportTask>, ApiError> {
    Ok(Json(state.imports().get(&id)?))
}

pub async fn cancel_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ImportTask>, ApiError> {
    Ok(Json(state.imports().cancel(&id)?))
}

/// Queue a fresh task that re-runs a completed or failed import
pub async fn reimport_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<ImportTask>), ApiError> {
    let task = state.imports().reimport(&id)?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn task_timeline(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<AuditRecord>>, ApiError> {
    Ok(Json(state.imports().timeline(&id)?))
}

/// The reimport chain ending at this task, newest first
pub async fn task_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ImportTask>>, ApiError> {
    Ok(Json(state.imports().history(&id)?))
}
