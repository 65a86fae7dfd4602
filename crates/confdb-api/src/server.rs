use crate::handlers::{configs, health_check, seed, AppState};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub struct ApiServer {
    host: String,
    port: u16,
    cors_enabled: bool,
    state: AppState,
}

impl ApiServer {
    pub fn new(host: String, port: u16, cors_enabled: bool, state: AppState) -> Self {
        Self {
            host,
            port,
            cors_enabled,
            state,
        }
    }

    pub fn router(state: AppState, cors_enabled: bool) -> Router {
        let mut app = Router::new()
            .route("/health", get(health_check))
            // Whole-store export / import
            .route("/api/configs", get(configs::dump_configs))
            .route("/api/configs/import", post(configs::import_configs))
            // Single documents
            .route("/api/configs/{config_type}", get(configs::list_configs))
            .route(
                "/api/configs/{config_type}/{config_id}",
                get(configs::get_config)
                    .put(configs::write_config)
                    .delete(configs::delete_config),
            )
            .route("/api/seed/reconcile", post(seed::reconcile_seed))
            .layer(TraceLayer::new_for_http())
            .with_state(state);

        if cors_enabled {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any);

            app = app.layer(cors);
        }

        app
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let app = Self::router(self.state, self.cors_enabled);

        let addr = format!("{}:{}", self.host, self.port);
        info!("Starting API server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use confdb_store::{ConfigStore, YamlSeedSource};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> (Router, ConfigStore) {
        let store = ConfigStore::in_memory();
        let seed = Arc::new(YamlSeedSource::bundled().unwrap());
        let state = AppState::new(store.clone().with_validation(), seed);
        (ApiServer::router(state, false), store)
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_reports_engine() {
        let (app, _) = app();
        let (status, body) = call(&app, "GET", "/health", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "healthy");
        assert_eq!(body["data"]["engine"], "memory");
    }

    #[tokio::test]
    async fn put_get_delete_round_trip() {
        let (app, _) = app();
        let workspace = json!({"workspaceId": "w1", "name": "Default", "slug": "default"});

        let (status, _) = call(
            &app,
            "PUT",
            "/api/configs/STANDARD_WORKSPACE/w1",
            Some(workspace.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(&app, "GET", "/api/configs/STANDARD_WORKSPACE/w1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], workspace);

        let (_, body) = call(&app, "GET", "/api/configs/STANDARD_WORKSPACE", None).await;
        assert_eq!(body["data"], json!([workspace]));

        let (status, _) = call(&app, "DELETE", "/api/configs/STANDARD_WORKSPACE/w1", None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(&app, "GET", "/api/configs/STANDARD_WORKSPACE/w1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn invalid_document_is_a_bad_request() {
        let (app, store) = app();

        let (status, body) = call(
            &app,
            "PUT",
            "/api/configs/STANDARD_SOURCE_DEFINITION/s1",
            Some(json!({"sourceDefinitionId": "s1"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");
        assert!(store.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn dry_run_import_counts_without_writing() {
        let (app, store) = app();
        let dump = json!({
            "STANDARD_WORKSPACE": [
                {"workspaceId": "w1", "name": "One"},
                {"workspaceId": "w2", "name": "Two"}
            ]
        });

        let (status, body) = call(
            &app,
            "POST",
            "/api/configs/import?dry_run=true",
            Some(dump.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!({"dry_run": true, "records": 2}));
        assert!(store.is_empty().await.unwrap());

        let (_, body) = call(&app, "POST", "/api/configs/import", Some(dump.clone())).await;
        assert_eq!(body["data"]["records"], 2);

        let (_, body) = call(&app, "GET", "/api/configs", None).await;
        assert_eq!(body["data"], dump);
    }

    #[tokio::test]
    async fn reconcile_fills_an_empty_store_then_is_a_no_op() {
        let (app, store) = app();

        let (status, body) = call(&app, "POST", "/api/seed/reconcile", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["mode"], "full_copy");
        let inserted = body["data"]["inserted"].as_u64().unwrap();
        assert!(inserted > 0);
        assert!(!store.is_empty().await.unwrap());

        let (_, body) = call(&app, "POST", "/api/seed/reconcile", None).await;
        assert_eq!(body["data"]["mode"], "merge");
        assert_eq!(body["data"]["inserted"], 0);
        assert_eq!(body["data"]["updated"], 0);
    }
}
