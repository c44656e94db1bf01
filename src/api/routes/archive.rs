//! Archival handlers.

use super::{TriggerArchiveRequest, TriggerArchiveResponse};
use crate::api::AppState;
use crate::archive::ArchiveRequest;
use crate::error::Error;
use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// POST /archive/:content_id - Trigger archival of a post
///
/// Returns as soon as the run is scheduled. The outcome of the run is never
/// reported back; poll `GET /archive/:content_id` to see the snapshot.
#[utoipa::path(
    post,
    path = "/archive/{content_id}",
    tag = "archive",
    params(
        ("content_id" = String, Path, description = "Post identifier")
    ),
    request_body(content = TriggerArchiveRequest, description = "Trigger options; the body may be omitted"),
    responses(
        (status = 202, description = "Trigger accepted", body = TriggerArchiveResponse),
        (status = 422, description = "Invalid content id or body", body = crate::error::ApiError),
        (status = 503, description = "Shutting down", body = crate::error::ApiError)
    )
)]
pub async fn trigger_archive(
    State(state): State<AppState>,
    Path(content_id): Path<String>,
    body: Bytes,
) -> Response {
    let options = if body.iter().all(u8::is_ascii_whitespace) {
        TriggerArchiveRequest::default()
    } else {
        match serde_json::from_slice::<TriggerArchiveRequest>(&body) {
            Ok(options) => options,
            Err(e) => {
                return Error::InvalidPayload(format!("invalid trigger body: {}", e))
                    .into_response();
            }
        }
    };

    let request = ArchiveRequest {
        content_id: content_id.clone(),
        force: options.force,
        comments: options.comments,
    };

    match state.service.orchestrator().trigger(request) {
        Ok(status) => (
            StatusCode::ACCEPTED,
            Json(TriggerArchiveResponse { content_id, status }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /archive/:content_id - Get a post's snapshot
#[utoipa::path(
    get,
    path = "/archive/{content_id}",
    tag = "archive",
    params(
        ("content_id" = String, Path, description = "Post identifier")
    ),
    responses(
        (status = 200, description = "Cached snapshot", body = crate::types::ContentSnapshot),
        (status = 404, description = "Post was never cached", body = crate::error::ApiError),
        (status = 422, description = "Invalid content id", body = crate::error::ApiError)
    )
)]
pub async fn get_snapshot(
    State(state): State<AppState>,
    Path(content_id): Path<String>,
) -> Response {
    match state.service.orchestrator().snapshot(&content_id).await {
        Ok(Some(snapshot)) => (StatusCode::OK, Json(snapshot)).into_response(),
        Ok(None) => {
            Error::NotFound(format!("snapshot for {}", content_id)).into_response()
        }
        Err(e) => e.into_response(),
    }
}
