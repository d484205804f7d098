//! AppError to HTTP response mapping.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use http_body_util::BodyExt;
use serde_json::Value;
use texsync_api::error::AppError;
use texsync_core::error::CoreError;
use texsync_store::StoreError;

async fn render(err: AppError) -> (StatusCode, Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

// ---------------------------------------------------------------------------
// Test: domain errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn core_errors_map_to_status_codes() {
    let (status, body) = render(
        CoreError::NotFound {
            entity: "Project",
            id: "p1".into(),
        }
        .into(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
    assert_eq!(body["error"], "Project with id p1 not found");

    let (status, body) = render(CoreError::Validation("No files to save".into()).into()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = render(CoreError::InvalidPath("../x".into()).into()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_PATH");

    let (status, _) = render(CoreError::Conflict("busy".into()).into()).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

// ---------------------------------------------------------------------------
// Test: internal details never leak
// ---------------------------------------------------------------------------

#[tokio::test]
async fn internal_errors_are_sanitized() {
    let (status, body) = render(CoreError::Internal("disk on fire at /srv".into()).into()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "INTERNAL_ERROR");
    assert_eq!(body["error"], "An internal error occurred");

    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "/srv/secret");
    let (status, body) = render(StoreError::from(io).into()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!body["error"].as_str().unwrap().contains("/srv"));

    let (status, _) = render(AppError::InternalError("boom".into())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

// ---------------------------------------------------------------------------
// Test: store-specific errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn store_errors_map_to_status_codes() {
    let (status, body) = render(StoreError::Unavailable("writes are disabled".into()).into()).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "SERVICE_UNAVAILABLE");

    let (status, body) = render(
        StoreError::TerminalState {
            job_id: "j1".into(),
            state: "success",
        }
        .into(),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Job j1 is already success");

    let (status, body) = render(StoreError::Core(CoreError::InvalidPath("x".into())).into()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_PATH");

    let (status, body) = render(AppError::BadRequest("path is required".into())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}
