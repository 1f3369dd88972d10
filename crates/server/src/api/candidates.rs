//! Candidate API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use snaggle_core::candidate::{CandidateKey, CandidateView, EnqueueOutcome};
use snaggle_core::policy::EvaluationTrace;
use snaggle_core::{MediaRef, SearchResult};

use super::error::ApiError;
use crate::state::AppState;

/// Request body for ingesting search results
#[derive(Debug, Deserialize)]
pub struct IngestBody {
    pub results: Vec<SearchResult>,
}

/// Response for ingest: classified candidates in input order
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub items: Vec<CandidateView>,
    pub total: usize,
}

/// Cache and classify raw search results.
pub async fn ingest(
    State(state): State<Arc<AppState>>,
    Json(body): Json<IngestBody>,
) -> Result<Json<IngestResponse>, ApiError> {
    let items = state.candidates().ingest(body.results)?;
    Ok(Json(IngestResponse {
        total: items.len(),
        items,
    }))
}

/// Evaluate policies for a cached candidate without side effects.
pub async fn preview(
    State(state): State<Arc<AppState>>,
    Path((indexer_id, guid)): Path<(i64, String)>,
    Json(media): Json<MediaRef>,
) -> Result<Json<EvaluationTrace>, ApiError> {
    let key = CandidateKey::new(indexer_id, guid);
    Ok(Json(state.candidates().preview(&key, media)?))
}

/// Turn a cached candidate into a download job.
///
/// Returns 201 for a new job and 200 when an active job for the same
/// candidate and media already existed.
pub async fn enqueue(
    State(state): State<Arc<AppState>>,
    Path((indexer_id, guid)): Path<(i64, String)>,
    Json(media): Json<MediaRef>,
) -> Result<(StatusCode, Json<EnqueueOutcome>), ApiError> {
    let key = CandidateKey::new(indexer_id, guid);
    let outcome = state.candidates().enqueue(&key, media)?;
    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome)))
}
