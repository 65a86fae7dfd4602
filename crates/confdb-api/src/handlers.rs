use axum::{extract::State, response::IntoResponse};
use confdb_store::{ConfigSource, ValidatingConfigStore};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::ApiResponse;

pub mod configs;
pub mod seed;

#[derive(Clone)]
pub struct AppState {
    pub store: ValidatingConfigStore,
    /// Desired catalogue used by `POST /api/seed/reconcile`
    pub seed: Arc<dyn ConfigSource>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(store: ValidatingConfigStore, seed: Arc<dyn ConfigSource>) -> Self {
        Self {
            store,
            seed,
            started_at: Instant::now(),
        }
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub engine: String,
    pub uptime_seconds: u64,
}

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "healthy".to_string(),
        engine: state.store.inner().engine_name().to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    };

    ApiResponse::success(response, "System is healthy")
}
