//! User-facing download queue handlers.

use super::{EnqueueDownloadRequest, ListDownloadsQuery};
use crate::api::AppState;
use crate::error::{Error, JobError};
use crate::types::JobId;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// POST /downloads - Queue a download
#[utoipa::path(
    post,
    path = "/downloads",
    tag = "downloads",
    request_body = EnqueueDownloadRequest,
    responses(
        (status = 201, description = "Job queued", body = crate::types::DownloadJob),
        (status = 400, description = "Invalid source URL", body = crate::error::ApiError),
        (status = 422, description = "Invalid request", body = crate::error::ApiError)
    )
)]
pub async fn enqueue_download(
    State(state): State<AppState>,
    Json(request): Json<EnqueueDownloadRequest>,
) -> Response {
    match state
        .service
        .queue()
        .enqueue(
            &request.owner,
            &request.source_url,
            request.task_type,
            request.cookies.as_deref(),
        )
        .await
    {
        Ok(job) => (StatusCode::CREATED, Json(job)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /downloads - List an owner's jobs, newest first
#[utoipa::path(
    get,
    path = "/downloads",
    tag = "downloads",
    params(
        ("owner" = String, Query, description = "Owner whose jobs to list"),
        ("limit" = Option<u32>, Query, description = "Maximum number of jobs (default: 50)")
    ),
    responses(
        (status = 200, description = "Owner's jobs", body = Vec<crate::types::DownloadJob>),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    )
)]
pub async fn list_downloads(
    State(state): State<AppState>,
    Query(query): Query<ListDownloadsQuery>,
) -> Response {
    match state
        .service
        .queue()
        .list_for_owner(&query.owner, query.limit)
        .await
    {
        Ok(jobs) => (StatusCode::OK, Json(jobs)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /downloads/stats - Job counts per status
#[utoipa::path(
    get,
    path = "/downloads/stats",
    tag = "downloads",
    responses(
        (status = 200, description = "Job counts", body = crate::types::QueueStats),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    )
)]
pub async fn queue_stats(State(state): State<AppState>) -> Response {
    match state.service.queue().stats().await {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /downloads/:id - Get a single job
#[utoipa::path(
    get,
    path = "/downloads/{id}",
    tag = "downloads",
    params(
        ("id" = i64, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Job", body = crate::types::DownloadJob),
        (status = 404, description = "Job not found", body = crate::error::ApiError)
    )
)]
pub async fn get_download(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.service.queue().get(JobId(id)).await {
        Ok(Some(job)) => (StatusCode::OK, Json(job)).into_response(),
        Ok(None) => Error::Job(JobError::NotFound { id }).into_response(),
        Err(e) => e.into_response(),
    }
}
