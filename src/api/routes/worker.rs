//! Worker-facing job protocol handlers.
//!
//! Mounted under `/internal` behind the service-key middleware.

use super::{ClaimJobsRequest, ClaimJobsResponse, CompleteJobRequest, FailJobRequest};
use crate::api::AppState;
use crate::error::{Error, JobError};
use crate::types::JobId;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// POST /internal/jobs/claim - Atomically claim pending jobs
#[utoipa::path(
    post,
    path = "/internal/jobs/claim",
    tag = "worker",
    request_body = ClaimJobsRequest,
    params(
        ("X-Service-Key" = String, Header, description = "Shared worker secret")
    ),
    responses(
        (status = 200, description = "Claimed batch (possibly empty)", body = ClaimJobsResponse),
        (status = 401, description = "Missing or invalid service key", body = crate::error::ApiError)
    )
)]
pub async fn claim_jobs(
    State(state): State<AppState>,
    Json(request): Json<ClaimJobsRequest>,
) -> Response {
    match state
        .service
        .queue()
        .claim(&request.worker_id, request.limit)
        .await
    {
        Ok(jobs) => (StatusCode::OK, Json(ClaimJobsResponse { jobs })).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /internal/jobs/:id/complete - Mark a processing job completed
#[utoipa::path(
    post,
    path = "/internal/jobs/{id}/complete",
    tag = "worker",
    request_body = CompleteJobRequest,
    params(
        ("id" = i64, Path, description = "Job ID"),
        ("X-Service-Key" = String, Header, description = "Shared worker secret")
    ),
    responses(
        (status = 200, description = "Job completed", body = crate::types::DownloadJob),
        (status = 401, description = "Missing or invalid service key", body = crate::error::ApiError),
        (status = 404, description = "Job not found", body = crate::error::ApiError),
        (status = 409, description = "Job is not processing", body = crate::error::ApiError)
    )
)]
pub async fn complete_job(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<CompleteJobRequest>,
) -> Response {
    let queue = state.service.queue();
    let result = queue
        .complete(
            JobId(id),
            &request.storage_key,
            request.metadata.as_ref(),
            request.size,
        )
        .await;

    match result {
        Ok(()) => current_job(&state, id).await,
        Err(e) => e.into_response(),
    }
}

/// POST /internal/jobs/:id/fail - Mark a processing job failed or invalid
#[utoipa::path(
    post,
    path = "/internal/jobs/{id}/fail",
    tag = "worker",
    request_body = FailJobRequest,
    params(
        ("id" = i64, Path, description = "Job ID"),
        ("X-Service-Key" = String, Header, description = "Shared worker secret")
    ),
    responses(
        (status = 200, description = "Job failed", body = crate::types::DownloadJob),
        (status = 401, description = "Missing or invalid service key", body = crate::error::ApiError),
        (status = 404, description = "Job not found", body = crate::error::ApiError),
        (status = 409, description = "Job is not processing", body = crate::error::ApiError)
    )
)]
pub async fn fail_job(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<FailJobRequest>,
) -> Response {
    let queue = state.service.queue();
    let result = if request.invalid {
        queue.mark_invalid(JobId(id), &request.error_message).await
    } else {
        queue.fail(JobId(id), &request.error_message).await
    };

    match result {
        Ok(()) => current_job(&state, id).await,
        Err(e) => e.into_response(),
    }
}

async fn current_job(state: &AppState, id: i64) -> Response {
    match state.service.queue().get(JobId(id)).await {
        Ok(Some(job)) => (StatusCode::OK, Json(job)).into_response(),
        Ok(None) => Error::Job(JobError::NotFound { id }).into_response(),
        Err(e) => e.into_response(),
    }
}
