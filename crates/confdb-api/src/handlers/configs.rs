use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::{handlers::AppState, ApiResponse};

#[derive(Debug, Default, Deserialize)]
pub struct ImportQuery {
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub dry_run: bool,
    pub records: usize,
}

pub async fn dump_configs(
    State(state): State<AppState>,
) -> ApiResponse<BTreeMap<String, Vec<Value>>> {
    match state.store.dump_configs().await {
        Ok(dump) => ApiResponse::success(dump, "Configs exported successfully"),
        Err(e) => ApiResponse::from_error(e),
    }
}

pub async fn import_configs(
    State(state): State<AppState>,
    Query(query): Query<ImportQuery>,
    Json(configs): Json<BTreeMap<String, Vec<Value>>>,
) -> ApiResponse<ImportResponse> {
    match state
        .store
        .replace_all_configs(&configs, query.dry_run)
        .await
    {
        Ok(records) => {
            let message = if query.dry_run {
                "Import validated, nothing written"
            } else {
                "Configs imported successfully"
            };
            ApiResponse::success(
                ImportResponse {
                    dry_run: query.dry_run,
                    records,
                },
                message,
            )
        }
        Err(e) => ApiResponse::from_error(e),
    }
}

pub async fn list_configs(
    State(state): State<AppState>,
    Path(config_type): Path<String>,
) -> ApiResponse<Vec<Value>> {
    match state.store.list_configs(&config_type).await {
        Ok(configs) => ApiResponse::success(configs, "Configs retrieved successfully"),
        Err(e) => ApiResponse::from_error(e),
    }
}

pub async fn get_config(
    State(state): State<AppState>,
    Path((config_type, config_id)): Path<(String, String)>,
) -> ApiResponse<Value> {
    match state.store.get_config(&config_type, &config_id).await {
        Ok(config) => ApiResponse::success(config, "Config retrieved successfully"),
        Err(e) => ApiResponse::from_error(e),
    }
}

pub async fn write_config(
    State(state): State<AppState>,
    Path((config_type, config_id)): Path<(String, String)>,
    Json(config): Json<Value>,
) -> ApiResponse<()> {
    match state
        .store
        .write_config(&config_type, &config_id, &config)
        .await
    {
        Ok(()) => ApiResponse::<()>::success_no_data("Config written successfully"),
        Err(e) => ApiResponse::from_error(e),
    }
}

pub async fn delete_config(
    State(state): State<AppState>,
    Path((config_type, config_id)): Path<(String, String)>,
) -> ApiResponse<()> {
    match state.store.delete_config(&config_type, &config_id).await {
        Ok(()) => ApiResponse::<()>::success_no_data("Config deleted successfully"),
        Err(e) => ApiResponse::from_error(e),
    }
}
