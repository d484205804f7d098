use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use texsync_store::archive::{archive_file_name, export_project};

use crate::error::AppResult;
use crate::state::AppState;

/// GET /api/projects/{id}/download
///
/// ZIP of the project's sources and artifacts; queue, working and status
/// records are left out.
pub async fn zip(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Response> {
    let project = state.catalog.require(&id).await?;
    let bytes = export_project(state.catalog.layout(), &id).await?;
    let file_name = archive_file_name(&id, &project.name);

    Ok((
        [
            (CONTENT_TYPE, "application/zip".to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        Body::from(bytes),
    )
        .into_response())
}
