#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use texsync_compiler::toolchain::SimulatedToolchain;
use texsync_compiler::ExecutionMode;
use texsync_store::models::project::{CreateProject, Project};
use texsync_store::projects::ProjectCatalog;
use texsync_store::{JobStore, MemoryJobStore, ProjectLayout};
use tower::ServiceExt;

use texsync_api::config::ServerConfig;
use texsync_api::router::build_app_router;
use texsync_api::state::AppState;

/// Build a test `ServerConfig` with safe defaults rooted at `files_dir`.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default),
/// fast watcher polling and a small docUpdate ceiling.
pub fn test_config(files_dir: &Path, mode: ExecutionMode) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        files_dir: files_dir.to_path_buf(),
        compile_mode: mode,
        status_poll_interval_ms: 20,
        watch_timeout_secs: 30,
        max_doc_update_bytes: 1024,
        heartbeat_interval_secs: 30,
        supersede_stale_jobs: false,
        latex_timeout_secs: 5,
    }
}

/// Everything a test needs: the router, the state behind it, and the
/// in-memory job store (kept concrete so tests can make it fail).
pub struct TestApp {
    pub tmp: TempDir,
    pub state: AppState,
    pub store: Arc<MemoryJobStore>,
    pub router: Router,
}

impl TestApp {
    pub fn layout(&self) -> &ProjectLayout {
        self.state.catalog.layout()
    }

    pub async fn create_project(&self, name: &str) -> Project {
        self.state
            .catalog
            .create(&CreateProject {
                name: Some(name.to_string()),
                ..Default::default()
            })
            .await
            .unwrap()
    }
}

/// Build the full application router with all middleware layers.
///
/// This goes through the same `build_app_router` as `main.rs` so tests
/// exercise the production middleware stack. Compiles use a fast simulator.
pub async fn build_test_app(mode: ExecutionMode) -> TestApp {
    build_test_app_with(mode, |_| {}).await
}

/// Like [`build_test_app`], with a hook to adjust the config first.
pub async fn build_test_app_with(
    mode: ExecutionMode,
    adjust: impl FnOnce(&mut ServerConfig),
) -> TestApp {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = test_config(tmp.path(), mode);
    adjust(&mut config);

    let catalog = ProjectCatalog::load(ProjectLayout::new(tmp.path()))
        .await
        .unwrap();
    let store = Arc::new(MemoryJobStore::new());
    let jobs: Arc<dyn JobStore> = store.clone();
    let toolchain = Arc::new(SimulatedToolchain::new(Duration::from_millis(10)));

    let state = AppState::new(config.clone(), catalog, jobs, toolchain);
    let router = build_app_router(state.clone(), &config);
    TestApp {
        tmp,
        state,
        store,
        router,
    }
}

/// Send a GET request to the app.
pub async fn get(app: &Router, uri: &str) -> Response {
    send(app, Method::GET, uri, None).await
}

/// Send a request with an optional JSON body.
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> Response {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(request).await.unwrap()
}

/// Read a response body as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Read a response body as raw bytes.
pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}
