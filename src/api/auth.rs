//! Service-key authentication for worker-facing routes
//!
//! Workers prove themselves with the shared secret in the `X-Service-Key`
//! header. Unlike a user-facing API key this check fails closed: when
//! `ApiConfig::service_key` is unset, every request is rejected.

use crate::error::ApiError;
use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Header carrying the worker's shared secret
pub const SERVICE_KEY_HEADER: &str = "x-service-key";

/// Middleware requiring a valid `X-Service-Key` header
///
/// # Returns
///
/// - 401 Unauthorized if no key is configured, or the header is missing or wrong
/// - The response from the next handler otherwise
///
/// # Examples
///
/// ```no_run
/// use axum::{Router, middleware, routing::post};
/// use tidyfeed_archive::api::auth::require_service_key;
///
/// let service_key = Some("worker-secret".to_string());
/// let router: Router = Router::new()
///     .route("/internal/ping", post(|| async { "pong" }))
///     .route_layer(middleware::from_fn_with_state(service_key, require_service_key));
/// ```
pub async fn require_service_key(
    State(expected_key): State<Option<String>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected_key) = expected_key else {
        tracing::warn!(
            path = %request.uri().path(),
            "Rejected internal request: no service key configured"
        );
        return unauthorized_response("Service key not configured");
    };

    let provided = request
        .headers()
        .get(SERVICE_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    // Uses constant-time comparison to prevent timing side-channel attacks
    match provided {
        Some(provided) if constant_time_eq(provided.as_bytes(), expected_key.as_bytes()) => {
            next.run(request).await
        }
        Some(_) => unauthorized_response("Invalid service key"),
        None => unauthorized_response("Missing X-Service-Key header"),
    }
}

/// Constant-time byte comparison.
/// Always compares all bytes regardless of where the first mismatch occurs.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

fn unauthorized_response(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(ApiError::unauthorized(message))).into_response()
}
