//! Filesystem object store.

use super::{
    ByteRange, ByteStream, ObjectBody, ObjectMeta, ObjectStore, PutOptions, clamp_range,
    validate_key,
};
use crate::Result;
use crate::error::StorageError;
use async_trait::async_trait;
use bytes::Bytes;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

/// Object store rooted at a directory
///
/// Bodies live under `{root}/objects/{key}`, metadata under
/// `{root}/meta/{key}.json`. Writes go to a temporary file first and are renamed
/// into place, so readers never observe a partial object.
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    /// Create a store rooted at `root` (created lazily on first write)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.root.join("objects").join(key)
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.root.join("meta").join(format!("{}.json", key))
    }

    async fn write_atomic(path: &Path, contents: &[u8], key: &str) -> Result<()> {
        let write_failed = |reason: String| StorageError::WriteFailed {
            key: key.to_string(),
            reason,
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| write_failed(format!("create directory: {}", e)))?;
        }

        let tmp = path.with_file_name(format!(
            ".{}.{:016x}.tmp",
            path.file_name().and_then(|n| n.to_str()).unwrap_or("object"),
            rand::random::<u64>()
        ));

        if let Err(e) = tokio::fs::write(&tmp, contents).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(write_failed(e.to_string()).into());
        }
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(write_failed(format!("rename: {}", e)).into());
        }

        Ok(())
    }

    async fn read_meta(&self, key: &str) -> PutOptions {
        match tokio::fs::read(self.meta_path(key)).await {
            Ok(raw) => serde_json::from_slice(&raw).unwrap_or_else(|e| {
                tracing::warn!(key, error = %e, "Ignoring unreadable object metadata");
                PutOptions::default()
            }),
            Err(_) => PutOptions::default(),
        }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, key: &str, body: Bytes, options: PutOptions) -> Result<()> {
        validate_key(key)?;

        let meta = serde_json::to_vec(&options)?;
        Self::write_atomic(&self.meta_path(key), &meta, key).await?;
        Self::write_atomic(&self.object_path(key), &body, key).await?;

        tracing::debug!(key, size = body.len(), "Stored object");
        Ok(())
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>> {
        validate_key(key)?;

        let metadata = match tokio::fs::metadata(self.object_path(key)).await {
            Ok(m) if m.is_file() => m,
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StorageError::ReadFailed {
                    key: key.to_string(),
                    reason: e.to_string(),
                }
                .into());
            }
        };

        let options = self.read_meta(key).await;
        Ok(Some(ObjectMeta {
            size: metadata.len(),
            content_type: options.content_type,
            cache_control: options.cache_control,
        }))
    }

    async fn get(&self, key: &str, range: Option<ByteRange>) -> Result<ObjectBody> {
        validate_key(key)?;

        let read_failed = |reason: String| StorageError::ReadFailed {
            key: key.to_string(),
            reason,
        };

        let mut file = match tokio::fs::File::open(self.object_path(key)).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound {
                    key: key.to_string(),
                }
                .into());
            }
            Err(e) => return Err(read_failed(e.to_string()).into()),
        };

        // Size from the open handle; a concurrent put renames a new file in
        // and leaves this one intact
        let size = file
            .metadata()
            .await
            .map_err(|e| read_failed(format!("stat: {}", e)))?
            .len();
        let range = clamp_range(key, range, size)?;

        let stream: ByteStream = match range {
            Some(range) => {
                file.seek(SeekFrom::Start(range.start))
                    .await
                    .map_err(|e| read_failed(format!("seek: {}", e)))?;
                Box::pin(ReaderStream::new(file.take(range.len())))
            }
            None => Box::pin(ReaderStream::new(file.take(size))),
        };

        Ok(ObjectBody {
            size,
            range,
            stream,
        })
    }
}
