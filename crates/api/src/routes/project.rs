//! Route definitions for the `/projects` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{compile, download, files, project};
use crate::state::AppState;

/// Routes mounted at `/projects`.
///
/// ```text
/// GET    /                              -> list
/// POST   /                              -> create
/// GET    /{id}                          -> get_by_id
/// DELETE /{id}                          -> delete
///
/// GET    /{id}/tree                     -> files::tree
/// GET    /{id}/files?path=              -> files::read
/// PUT    /{id}/files                    -> files::save
///
/// POST   /{id}/compile                  -> compile::request
/// POST   /{id}/compile/cancel           -> compile::cancel
/// GET    /{id}/compile/{job_id}         -> compile::status
///
/// GET    /{id}/download                 -> download::zip
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(project::list).post(project::create))
        .route("/{id}", get(project::get_by_id).delete(project::delete))
        .route("/{id}/tree", get(files::tree))
        .route("/{id}/files", get(files::read).put(files::save))
        .route("/{id}/compile", post(compile::request))
        .route("/{id}/compile/cancel", post(compile::cancel))
        .route("/{id}/compile/{job_id}", get(compile::status))
        .route("/{id}/download", get(download::zip))
}
