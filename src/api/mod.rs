//! REST API server module
//!
//! Exposes the archival trigger, snapshot lookup, the download queue (both the
//! user-facing side and the worker-facing `/internal` side) and the
//! range-aware media endpoint.

use crate::{ArchiveService, Config, Result};
use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod auth;
pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all routes configured
///
/// # Arguments
///
/// * `service` - Shared archive service
/// * `config` - Configuration (bind address, service key, CORS, Swagger UI)
///
/// The `/internal/*` routes always sit behind [`auth::require_service_key`];
/// with no service key configured they reject every request.
pub fn create_router(service: Arc<ArchiveService>, config: Arc<Config>) -> Router {
    let state = AppState::new(service, config.clone());

    // Worker-facing routes
    let internal = Router::new()
        .route("/internal/jobs/claim", post(routes::claim_jobs))
        .route("/internal/jobs/:id/complete", post(routes::complete_job))
        .route("/internal/jobs/:id/fail", post(routes::fail_job))
        .route_layer(middleware::from_fn_with_state(
            config.server.api.service_key.clone(),
            auth::require_service_key,
        ));

    let router = Router::new()
        // System
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec))
        // Archival
        .route(
            "/archive/:content_id",
            post(routes::trigger_archive).get(routes::get_snapshot),
        )
        // Download queue
        .route(
            "/downloads",
            post(routes::enqueue_download).get(routes::list_downloads),
        )
        .route("/downloads/stats", get(routes::queue_stats))
        .route("/downloads/:id", get(routes::get_download))
        // Cached media
        .route("/media/*key", get(routes::serve_media))
        .merge(internal);

    // Merge Swagger UI routes if enabled in config (before applying state)
    let router = if config.server.api.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    let router = router.with_state(state).layer(TraceLayer::new_for_http());

    // Apply CORS middleware if enabled in config
    if config.server.api.cors_enabled {
        let cors = build_cors_layer(&config.server.api.cors_origins);
        router.layer(cors)
    } else {
        router
    }
}

fn build_cors_layer(origins: &[String]) -> CorsLayer {
    // Check if "*" (all origins) is in the list
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server
///
/// Binds to `server.api.bind_address` and serves until the task is dropped
/// or the listener fails.
pub async fn start_api_server(service: Arc<ArchiveService>, config: Arc<Config>) -> Result<()> {
    let bind_address = config.server.api.bind_address;

    tracing::info!(address = %bind_address, "Starting API server");

    if config.server.api.service_key.is_none() {
        tracing::warn!("No service key configured; /internal routes will reject every request");
    }

    let app = create_router(service, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(address = %bind_address, "API server listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
