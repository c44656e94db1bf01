//! In-process object store.

use super::{ByteRange, ObjectBody, ObjectMeta, ObjectStore, PutOptions, clamp_range, validate_key};
use crate::Result;
use crate::error::StorageError;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

#[derive(Clone)]
struct StoredObject {
    body: Bytes,
    options: PutOptions,
}

/// Object store backed by a map; contents are lost when dropped
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, StoredObject>>,
    puts: AtomicU64,
    heads: AtomicU64,
    gets: Mutex<Vec<(String, Option<ByteRange>)>>,
}

impl MemoryObjectStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of `put` calls, including overwrites
    pub fn put_count(&self) -> u64 {
        self.puts.load(Ordering::SeqCst)
    }

    /// Total number of `head` calls
    pub fn head_count(&self) -> u64 {
        self.heads.load(Ordering::SeqCst)
    }

    /// Every `get` call so far as `(key, requested range)`, oldest first
    pub fn get_calls(&self) -> Vec<(String, Option<ByteRange>)> {
        self.gets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Keys currently stored, sorted
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Full body of an object
    pub async fn get_bytes(&self, key: &str) -> Option<Bytes> {
        self.objects.read().await.get(key).map(|o| o.body.clone())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, body: Bytes, options: PutOptions) -> Result<()> {
        validate_key(key)?;
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.objects
            .write()
            .await
            .insert(key.to_string(), StoredObject { body, options });
        Ok(())
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>> {
        validate_key(key)?;
        self.heads.fetch_add(1, Ordering::SeqCst);
        Ok(self.objects.read().await.get(key).map(|o| ObjectMeta {
            size: o.body.len() as u64,
            content_type: o.options.content_type.clone(),
            cache_control: o.options.cache_control.clone(),
        }))
    }

    async fn get(&self, key: &str, range: Option<ByteRange>) -> Result<ObjectBody> {
        validate_key(key)?;
        self.gets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((key.to_string(), range));

        let body = self
            .objects
            .read()
            .await
            .get(key)
            .map(|o| o.body.clone())
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            })?;

        let size = body.len() as u64;
        let range = clamp_range(key, range, size)?;
        let bytes = match range {
            Some(r) => body.slice(r.start as usize..=r.end as usize),
            None => body,
        };

        Ok(ObjectBody {
            size,
            range,
            stream: Box::pin(futures::stream::once(async move { Ok(bytes) })),
        })
    }
}
