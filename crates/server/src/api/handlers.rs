use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use snaggle_core::candidate::{context_fields, FieldInfo};
use snaggle_core::{ParseResult, SanitizedConfig};

use super::error::ApiError;
use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

/// Request body for classifying a release title
#[derive(Debug, Deserialize)]
pub struct ParseReleaseBody {
    pub title: String,
}

/// Classify a single release title.
pub async fn parse_release(
    Json(body): Json<ParseReleaseBody>,
) -> Result<Json<ParseResult>, ApiError> {
    if body.title.trim().is_empty() {
        return Err(ApiError::bad_request("title is required"));
    }
    Ok(Json(snaggle_core::release::parse(&body.title)))
}

/// Every path rules and name templates can reference.
pub async fn list_fields() -> Json<&'static [FieldInfo]> {
    Json(context_fields())
}

/// Prometheus scrape endpoint.
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state);
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
