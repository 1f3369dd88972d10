//! Policy API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use snaggle_core::policy::PolicyInput;
use snaggle_core::Policy;
use tracing::info;

use super::error::ApiError;
use crate::state::AppState;

/// Response for listing policies, in evaluation order
#[derive(Debug, Serialize)]
pub struct ListPoliciesResponse {
    pub items: Vec<Policy>,
    pub total: usize,
}

pub async fn list_policies(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ListPoliciesResponse>, ApiError> {
    let items = state.policies().list()?;
    Ok(Json(ListPoliciesResponse {
        total: items.len(),
        items,
    }))
}

pub async fn get_policy(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Policy>, ApiError> {
    state
        .policies()
        .get(&id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Policy not found: {}", id)))
}

pub async fn create_policy(
    State(state): State<Arc<AppState>>,
    Json(input): Json<PolicyInput>,
) -> Result<(StatusCode, Json<Policy>), ApiError> {
    let policy = state.policies().create(input)?;
    info!(policy_id = %policy.id, name = %policy.name, "Policy created");
    Ok((StatusCode::CREATED, Json(policy)))
}

pub async fn update_policy(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(input): Json<PolicyInput>,
) -> Result<Json<Policy>, ApiError> {
    let policy = state.policies().update(&id, input)?;
    info!(policy_id = %policy.id, "Policy updated");
    Ok(Json(policy))
}

pub async fn delete_policy(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Policy>, ApiError> {
    let policy = state.policies().delete(&id)?;
    info!(policy_id = %policy.id, "Policy deleted");
    Ok(Json(policy))
}
