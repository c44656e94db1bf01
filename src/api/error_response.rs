//! HTTP error response handling for the API
//!
//! Converts domain errors to HTTP responses with appropriate status codes and
//! JSON error bodies.

use crate::error::{ApiError, Error, ToHttpStatus};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Implement IntoResponse for Error to automatically convert errors to HTTP responses
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status_code.is_server_error() {
            tracing::error!(error = %self, code = self.error_code(), "Request failed");
        }

        let api_error: ApiError = self.into();

        (status_code, Json(api_error)).into_response()
    }
}

/// Implement IntoResponse for ApiError for explicit error responses
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Errors with a known status go through Error::into_response
        (StatusCode::INTERNAL_SERVER_ERROR, Json(self)).into_response()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{JobError, StorageError};

    async fn into_api_error(response: Response) -> ApiError {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_error_into_response() {
        let response = Error::NotFound("snapshot for 42".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let api_error = into_api_error(response).await;
        assert_eq!(api_error.error.code, "not_found");
        assert!(api_error.error.message.contains("snapshot for 42"));
        assert!(api_error.error.details.is_none());
    }

    #[tokio::test]
    async fn test_invalid_transition_into_response() {
        let response = Error::Job(JobError::InvalidTransition {
            id: 456,
            from: "completed".to_string(),
            to: "failed".to_string(),
        })
        .into_response();

        assert_eq!(response.status(), StatusCode::CONFLICT);

        let api_error = into_api_error(response).await;
        assert_eq!(api_error.error.code, "invalid_transition");
        let details = api_error.error.details.unwrap();
        assert_eq!(details["job_id"], 456);
        assert_eq!(details["current_status"], "completed");
        assert_eq!(details["requested_status"], "failed");
    }

    #[tokio::test]
    async fn test_invalid_key_into_response() {
        let response = Error::Storage(StorageError::InvalidKey {
            key: "../secret".to_string(),
        })
        .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let api_error = into_api_error(response).await;
        assert_eq!(api_error.error.code, "invalid_key");
        assert_eq!(api_error.error.details.unwrap()["key"], "../secret");
    }

    #[tokio::test]
    async fn test_shutting_down_into_response() {
        let response = Error::ShuttingDown.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(into_api_error(response).await.error.code, "shutting_down");
    }

    #[tokio::test]
    async fn test_api_error_defaults_to_500() {
        let response = ApiError::new("boom", "exploded").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
