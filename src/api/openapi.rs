//! OpenAPI documentation and schema generation
//!
//! Defines the OpenAPI specification for the tidyfeed-archive REST API using
//! utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the tidyfeed-archive REST API
///
/// The spec can be accessed via:
/// - `/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation (when enabled)
#[derive(OpenApi)]
#[openapi(
    info(
        title = "tidyfeed-archive REST API",
        version = "0.1.0",
        description = "Post archival, download-job queue and range-aware media serving",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:6790", description = "Local development server")
    ),
    paths(
        // Archival
        crate::api::routes::trigger_archive,
        crate::api::routes::get_snapshot,

        // Download queue
        crate::api::routes::enqueue_download,
        crate::api::routes::list_downloads,
        crate::api::routes::queue_stats,
        crate::api::routes::get_download,

        // Worker protocol
        crate::api::routes::claim_jobs,
        crate::api::routes::complete_job,
        crate::api::routes::fail_job,

        // Media
        crate::api::routes::serve_media,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
    ),
    components(schemas(
        // Core types from types.rs
        crate::types::JobId,
        crate::types::JobStatus,
        crate::types::TaskType,
        crate::types::DownloadJob,
        crate::types::QueueStats,
        crate::types::SnapshotFlags,
        crate::types::ContentSnapshot,

        // Post model
        crate::post::Comment,
        crate::archive::TriggerStatus,

        // API request/response types from routes
        crate::api::routes::TriggerArchiveRequest,
        crate::api::routes::TriggerArchiveResponse,
        crate::api::routes::EnqueueDownloadRequest,
        crate::api::routes::ListDownloadsQuery,
        crate::api::routes::ClaimJobsRequest,
        crate::api::routes::ClaimJobsResponse,
        crate::api::routes::CompleteJobRequest,
        crate::api::routes::FailJobRequest,
        crate::api::routes::HealthResponse,

        // Error types from error.rs
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "archive", description = "Archival - Trigger snapshots and read cached posts"),
        (name = "downloads", description = "Download queue - Queue downloads and follow their status"),
        (name = "worker", description = "Worker protocol - Claim, complete and fail jobs (service key required)"),
        (name = "media", description = "Cached media - Range-aware object serving"),
        (name = "system", description = "System endpoints - Health checks and OpenAPI spec"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Adds the worker service-key scheme to the spec
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = &mut openapi.components {
            components.add_security_scheme(
                "service_key",
                utoipa::openapi::security::SecurityScheme::ApiKey(
                    utoipa::openapi::security::ApiKey::Header(
                        utoipa::openapi::security::ApiKeyValue::new("X-Service-Key"),
                    ),
                ),
            );
        }
    }
}
