//! Object storage
//!
//! Rendered snapshots, re-hosted media and worker downloads all live in an
//! object store addressed by slash-separated keys. [`ObjectStore`] is the seam;
//! [`LocalObjectStore`] keeps objects on disk with a JSON metadata sidecar and
//! [`MemoryObjectStore`] keeps them in process.

use crate::config::{StorageBackend, StorageConfig};
use crate::error::StorageError;
use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

mod local;
mod memory;

pub use local::LocalObjectStore;
pub use memory::MemoryObjectStore;

/// Cache directive for content that never changes under its key
pub const IMMUTABLE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Content type used when nothing better is known
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Streamed object body
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

/// HTTP metadata stored with an object
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutOptions {
    /// MIME type served back to clients
    pub content_type: Option<String>,
    /// Cache-Control directive served back to clients
    pub cache_control: Option<String>,
}

impl PutOptions {
    /// Options for immutable content of the given type
    pub fn immutable(content_type: impl Into<String>) -> Self {
        Self {
            content_type: Some(content_type.into()),
            cache_control: Some(IMMUTABLE_CACHE_CONTROL.to_string()),
        }
    }
}

/// Result of a metadata-only lookup
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Object size in bytes
    pub size: u64,
    /// Stored MIME type
    pub content_type: Option<String>,
    /// Stored Cache-Control directive
    pub cache_control: Option<String>,
}

/// Inclusive byte range within an object
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteRange {
    /// First byte offset
    pub start: u64,
    /// Last byte offset (inclusive)
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// A range always covers at least one byte
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// An opened object
///
/// `size` and `range` describe the object as it was when opened, which may
/// differ from an earlier [`ObjectStore::head`] if it was overwritten since.
pub struct ObjectBody {
    /// Object size in bytes
    pub size: u64,
    /// Range being streamed, clamped to `size`; `None` for the whole object
    pub range: Option<ByteRange>,
    /// Body bytes
    pub stream: ByteStream,
}

/// Key-addressed blob storage
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write (or overwrite) an object
    async fn put(&self, key: &str, body: Bytes, options: PutOptions) -> Result<()>;

    /// Read an object's size and metadata without reading its body
    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>>;

    /// Stream an object, or the given inclusive range of it
    ///
    /// The range end is clamped to the size of the object as opened. A range
    /// starting past that size fails with [`StorageError::RangeNotSatisfiable`].
    async fn get(&self, key: &str, range: Option<ByteRange>) -> Result<ObjectBody>;
}

/// Fit `range` to an object of `size` bytes
fn clamp_range(key: &str, range: Option<ByteRange>, size: u64) -> Result<Option<ByteRange>> {
    let Some(range) = range else {
        return Ok(None);
    };
    if range.start >= size {
        return Err(StorageError::RangeNotSatisfiable {
            key: key.to_string(),
            start: range.start,
            size,
        }
        .into());
    }
    Ok(Some(ByteRange {
        start: range.start,
        end: range.end.min(size - 1),
    }))
}

/// Build the configured object store
pub fn build_object_store(config: &StorageConfig) -> Arc<dyn ObjectStore> {
    match config.backend {
        StorageBackend::Local => Arc::new(LocalObjectStore::new(config.root.clone())),
        StorageBackend::Memory => Arc::new(MemoryObjectStore::new()),
    }
}

/// Reject keys that could escape the store root or are ambiguous
///
/// Keys are relative, slash-separated, with no empty, `.` or `..` segments and
/// no backslashes.
pub fn validate_key(key: &str) -> Result<()> {
    let invalid = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.contains('\0')
        || key
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");

    if invalid {
        return Err(StorageError::InvalidKey {
            key: key.to_string(),
        }
        .into());
    }
    Ok(())
}

/// Guess a MIME type from a key's extension
///
/// HTML is tagged UTF-8 since rendered snapshots are always written as such.
pub fn content_type_for_key(key: &str) -> Option<String> {
    let mime = mime_guess::from_path(key).first()?;
    if mime == mime_guess::mime::TEXT_HTML {
        return Some("text/html; charset=utf-8".to_string());
    }
    Some(mime.essence_str().to_string())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        for ok in ["snapshots/1.html", "images/1/media/a.jpg", "a"] {
            assert!(validate_key(ok).is_ok(), "{ok}");
        }
        for bad in ["", "/abs", "a//b", "a/../b", "..", "a/./b", "a\\b", "trailing/"] {
            assert!(validate_key(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_content_type_for_key() {
        assert_eq!(content_type_for_key("a/b.JPG").as_deref(), Some("image/jpeg"));
        assert_eq!(content_type_for_key("images/1/a.png").as_deref(), Some("image/png"));
        assert_eq!(content_type_for_key("videos/1/x.mp4").as_deref(), Some("video/mp4"));
        assert_eq!(content_type_for_key("videos/1/x.webm").as_deref(), Some("video/webm"));
        assert_eq!(
            content_type_for_key("snapshots/1.html").as_deref(),
            Some("text/html; charset=utf-8")
        );
        assert_eq!(content_type_for_key("noext"), None);
    }

    #[test]
    fn test_clamp_range() {
        assert_eq!(clamp_range("k", None, 10).unwrap(), None);
        assert_eq!(
            clamp_range("k", Some(ByteRange { start: 2, end: 99 }), 10).unwrap(),
            Some(ByteRange { start: 2, end: 9 })
        );
        assert!(matches!(
            clamp_range("k", Some(ByteRange { start: 10, end: 20 }), 10),
            Err(crate::Error::Storage(StorageError::RangeNotSatisfiable { size: 10, .. }))
        ));
    }

    #[test]
    fn test_byte_range_len() {
        assert_eq!(ByteRange { start: 0, end: 99 }.len(), 100);
        assert_eq!(ByteRange { start: 5, end: 5 }.len(), 1);
    }
}
