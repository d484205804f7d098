pub mod health;
pub mod project;

use axum::routing::get;
use axum::{Json, Router};

use crate::response::VersionResponse;
use crate::state::AppState;

/// Build the `/api` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /health                                          service health
/// /version                                         API version
///
/// /projects                                        list, create
/// /projects/{id}                                   get, delete
/// /projects/{id}/tree                              file tree
/// /projects/{id}/files                             read (GET ?path=), save (PUT)
/// /projects/{id}/compile                           enqueue compile (POST)
/// /projects/{id}/compile/cancel                    cancel compile (POST)
/// /projects/{id}/compile/{job_id}                  job status (GET)
/// /projects/{id}/download                          ZIP export (GET)
/// ```
///
/// The WebSocket endpoint and static files are mounted by the app router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .route("/version", get(version))
        .nest("/projects", project::router())
}

/// GET /api/version
async fn version() -> Json<VersionResponse> {
    Json(VersionResponse {
        api: env!("CARGO_PKG_VERSION"),
    })
}
