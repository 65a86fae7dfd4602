use axum::extract::State;
use confdb_store::{ReconcileReport, SeedReconciler};

use crate::{handlers::AppState, ApiResponse};

pub async fn reconcile_seed(State(state): State<AppState>) -> ApiResponse<ReconcileReport> {
    let reconciler = SeedReconciler::new(state.store.inner().clone());

    match reconciler.reconcile(state.seed.as_ref()).await {
        Ok(report) => ApiResponse::success(report, "Seed reconciled successfully"),
        Err(e) => ApiResponse::from_error(e),
    }
}
