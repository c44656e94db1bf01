//! Range-aware cached media handler.
//!
//! Reads the object metadata with `head`, resolves the `Range` header
//! against its size, then issues exactly one (possibly ranged) read and
//! streams it back.

use crate::api::AppState;
use crate::error::{Error, Result, StorageError};
use crate::range::{RangeOutcome, parse_range};
use crate::storage::{DEFAULT_CONTENT_TYPE, validate_key};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};

/// GET /media/*key - Serve a cached object with HTTP range support
#[utoipa::path(
    get,
    path = "/media/{key}",
    tag = "media",
    params(
        ("key" = String, Path, description = "Object key, e.g. images/123/media/photo.jpg"),
        ("Range" = Option<String>, Header, description = "Single byte range, e.g. bytes=0-99")
    ),
    responses(
        (status = 200, description = "Whole object"),
        (status = 206, description = "Requested byte range"),
        (status = 400, description = "Invalid key", body = crate::error::ApiError),
        (status = 404, description = "Object not found", body = crate::error::ApiError),
        (status = 416, description = "Range not satisfiable")
    )
)]
pub async fn serve_media(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> Response {
    match media_response(&state, &key, &headers).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn media_response(state: &AppState, key: &str, headers: &HeaderMap) -> Result<Response> {
    validate_key(key)?;
    let store = state.service.store();

    let meta = store.head(key).await?.ok_or_else(|| StorageError::NotFound {
        key: key.to_string(),
    })?;

    let range_header = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok());

    let range = match parse_range(range_header, meta.size) {
        RangeOutcome::Full => None,
        RangeOutcome::Partial(range) => Some(range),
        RangeOutcome::Unsatisfiable => {
            tracing::debug!(key, range = ?range_header, size = meta.size, "Unsatisfiable range");
            return unsatisfiable(meta.size);
        }
    };

    // Lengths come from the object as opened, which an overwrite may have
    // changed since the `head`
    let body = match store.get(key, range).await {
        Ok(body) => body,
        Err(Error::Storage(StorageError::RangeNotSatisfiable { size, .. })) => {
            tracing::debug!(key, size, "Object shrank below requested range");
            return unsatisfiable(size);
        }
        Err(e) => return Err(e),
    };

    let status = if body.range.is_some() {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };
    let content_length = body.range.map_or(body.size, |r| r.len());

    let mut builder = Response::builder()
        .status(status)
        .header(
            header::CONTENT_TYPE,
            meta.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE),
        )
        .header(header::CONTENT_LENGTH, content_length)
        .header(header::ACCEPT_RANGES, "bytes");

    if let Some(cache_control) = &meta.cache_control {
        builder = builder.header(header::CACHE_CONTROL, cache_control.as_str());
    }
    if let Some(range) = body.range {
        builder = builder.header(
            header::CONTENT_RANGE,
            format!("bytes {}-{}/{}", range.start, range.end, body.size),
        );
    }

    builder
        .body(Body::from_stream(body.stream))
        .map_err(|e| Error::Other(format!("failed to build response: {}", e)))
}

fn unsatisfiable(size: u64) -> Result<Response> {
    Response::builder()
        .status(StatusCode::RANGE_NOT_SATISFIABLE)
        .header(header::CONTENT_RANGE, format!("bytes */{}", size))
        .header(header::ACCEPT_RANGES, "bytes")
        .body(Body::empty())
        .map_err(|e| Error::Other(format!("failed to build response: {}", e)))
}
