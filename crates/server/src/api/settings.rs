//! Runtime settings API handlers.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use snaggle_core::settings::{definition, definitions, SettingType, SettingValue};

use super::error::ApiError;
use crate::state::AppState;

/// One setting with its current value and registry metadata
#[derive(Debug, Serialize)]
pub struct SettingResponse {
    pub key: String,
    pub value: SettingValue,
    pub value_type: SettingType,
    pub default: SettingValue,
    pub description: String,
}

/// Request body for updating a setting
#[derive(Debug, Deserialize)]
pub struct UpdateSettingBody {
    pub value: serde_json::Value,
}

fn describe(key: &str, value: SettingValue) -> Result<SettingResponse, ApiError> {
    let def = definition(key).ok_or_else(|| ApiError::not_found(format!("Unknown setting: {}", key)))?;
    Ok(SettingResponse {
        key: def.key.to_string(),
        value,
        value_type: def.value_type,
        default: def.default.clone(),
        description: def.description.to_string(),
    })
}

/// All known settings, in registry order
pub async fn list_settings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SettingResponse>>, ApiError> {
    let current = state.settings().get_all()?;
    let items = definitions()
        .iter()
        .map(|def| {
            let value = current
                .get(def.key)
                .cloned()
                .unwrap_or_else(|| def.default.clone());
            describe(def.key, value)
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(items))
}

pub async fn get_setting(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<SettingResponse>, ApiError> {
    let value = state.settings().get(&key)?;
    Ok(Json(describe(&key, value)?))
}

pub async fn update_setting(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Json(body): Json<UpdateSettingBody>,
) -> Result<Json<SettingResponse>, ApiError> {
    let value = state.settings().set(&key, &body.value)?;
    Ok(Json(describe(&key, value)?))
}
