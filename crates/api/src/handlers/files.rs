//! Handlers for project source files.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use texsync_store::models::file::{FileContent, FileInfo, PutFiles};

use crate::error::{AppError, AppResult};
use crate::response::SavedFiles;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct FileQuery {
    pub path: Option<String>,
}

/// GET /api/projects/{id}/tree
pub async fn tree(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<FileInfo>>> {
    state.catalog.require(&id).await?;
    Ok(Json(state.files.tree(&id).await?))
}

/// GET /api/projects/{id}/files?path=
pub async fn read(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<FileQuery>,
) -> AppResult<Json<FileContent>> {
    state.catalog.require(&id).await?;
    let path = query
        .path
        .ok_or_else(|| AppError::BadRequest("Missing `path` query parameter".into()))?;
    Ok(Json(state.files.read(&id, &path).await?))
}

/// PUT /api/projects/{id}/files
///
/// Unsaved buffers for the written files are replaced with the saved
/// content, so a later compile does not resurrect older text.
pub async fn save(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<PutFiles>,
) -> AppResult<Json<SavedFiles>> {
    state.catalog.require(&id).await?;
    let saved = state.files.write_all(&id, &input.files).await?;

    for (file, written) in input.files.iter().zip(&saved) {
        if state.registry.buffer(&id, &written.path).await.is_some() {
            state
                .registry
                .set_buffer(&id, &written.path, file.content.clone())
                .await;
        }
    }
    state.catalog.touch(&id).await?;

    tracing::debug!(project_id = %id, count = saved.len(), "Files saved over REST");
    Ok(Json(SavedFiles { saved }))
}
