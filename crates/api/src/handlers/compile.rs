//! Handlers for compile jobs.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use texsync_core::error::CoreError;
use texsync_core::job::{JobStatusRecord, DEFAULT_ENTRY_FILE};

use crate::error::AppResult;
use crate::response::{CancelResponse, CompileAccepted};
use crate::state::AppState;

/// Recorded as the job requestor for compiles started over REST.
const REQUESTOR: &str = "rest";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileBody {
    pub entry_file: Option<String>,
    pub path: Option<String>,
    pub engine: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelBody {
    pub job_id: Option<String>,
}

/// POST /api/projects/{id}/compile
///
/// Like `requestCompile` on the socket, the job is always enqueued against
/// the project's latest revision.
pub async fn request(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<CompileBody>>,
) -> AppResult<(StatusCode, Json<CompileAccepted>)> {
    let project = state.catalog.require(&id).await?;
    let body = body.map(|Json(body)| body).unwrap_or_default();

    let entry_file = body
        .entry_file
        .or(body.path)
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_ENTRY_FILE.to_string());
    let engine = body
        .engine
        .filter(|e| !e.trim().is_empty())
        .unwrap_or(project.engine);

    let revision = state.registry.latest_revision(&id).await;
    let job = state
        .dispatcher
        .enqueue(&id, &entry_file, &engine, revision, REQUESTOR)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(CompileAccepted {
            job_id: job.job_id,
            revision: job.revision,
        }),
    ))
}

/// GET /api/projects/{id}/compile/{job_id}
///
/// 404 while the job is still queued: queued jobs have no status record.
pub async fn status(
    State(state): State<AppState>,
    Path((id, job_id)): Path<(String, String)>,
) -> AppResult<Json<JobStatusRecord>> {
    state.catalog.require(&id).await?;
    let record = state
        .jobs
        .status(&id, &job_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Job status",
            id: job_id,
        })?;
    Ok(Json(record))
}

/// POST /api/projects/{id}/compile/cancel
///
/// Without a `jobId` the project's most recent job is canceled.
pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<CancelBody>>,
) -> AppResult<(StatusCode, Json<CancelResponse>)> {
    state.catalog.require(&id).await?;
    let body = body.map(|Json(body)| body).unwrap_or_default();

    let canceled = match body.job_id.filter(|j| !j.is_empty()) {
        Some(job_id) => state.dispatcher.cancel(&id, &job_id).await?,
        None => state.dispatcher.cancel_latest(&id).await?,
    };
    Ok((StatusCode::ACCEPTED, Json(CancelResponse { canceled })))
}
