//! Handlers for the `/projects` resource.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use texsync_store::models::project::{CreateProject, Project, ProjectDetail, ProjectListQuery};

use crate::error::AppResult;
use crate::state::AppState;

/// POST /api/projects
pub async fn create(
    State(state): State<AppState>,
    input: Option<Json<CreateProject>>,
) -> AppResult<(StatusCode, Json<Project>)> {
    let input = input.map(|Json(input)| input).unwrap_or_default();
    let project = state.catalog.create(&input).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// GET /api/projects
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ProjectListQuery>,
) -> AppResult<Json<Vec<Project>>> {
    Ok(Json(state.catalog.list(&query).await))
}

/// GET /api/projects/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ProjectDetail>> {
    let project = state.catalog.require(&id).await?;
    let files = state.files.tree(&id).await?;
    Ok(Json(ProjectDetail { project, files }))
}

/// DELETE /api/projects/{id}
///
/// Idempotent: deleting an unknown project is not an error.
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<StatusCode> {
    let deleted = state.catalog.delete(&id).await?;
    if deleted {
        state.ws_manager.close_project(&id).await;
        state.registry.forget(&id).await;
        state.dispatcher.forget(&id).await;
    }
    Ok(StatusCode::NO_CONTENT)
}
