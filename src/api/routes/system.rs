//! Liveness and API description

use crate::api::AppState;
use crate::api::openapi::ApiDoc;
use axum::{Json, extract::State};
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

/// Health payload
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Always `"ok"` while the process answers
    pub status: String,
    /// Crate version
    pub version: String,
    /// Whether archival triggers are accepted (false once shutdown begins)
    pub accepting: bool,
    /// Archival runs still in flight
    pub archive_runs: usize,
}

/// GET /health
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses(
        (status = 200, description = "Process is up", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let supervisor = state.service.supervisor();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        accepting: supervisor.is_accepting(),
        archive_runs: supervisor.in_flight(),
    })
}

/// GET /openapi.json
#[utoipa::path(
    get,
    path = "/openapi.json",
    tag = "system",
    responses(
        (status = 200, description = "OpenAPI document")
    )
)]
pub async fn openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
