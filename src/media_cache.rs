//! Media re-hosting
//!
//! [`MediaCacheService`] copies a post's origin media and avatars into object
//! storage and reports where each one ended up. Every asset writes to its own
//! key, so fetches fan out concurrently without any locking. Failures are
//! logged and the asset is left out of the result; nothing is retried.

use crate::config::{ArchiveConfig, StorageConfig};
use crate::post::MediaKind;
use crate::storage::{
    DEFAULT_CONTENT_TYPE, ObjectStore, PutOptions, content_type_for_key, validate_key,
};
use crate::{Error, Result};
use bytes::{Bytes, BytesMut};
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// One piece of post media to re-host
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaDescriptor {
    /// Origin URL
    pub url: String,
    /// Kind of media (decides the key prefix)
    pub kind: MediaKind,
}

impl MediaDescriptor {
    /// Describe one origin asset
    pub fn new(url: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            url: url.into(),
            kind,
        }
    }
}

/// Where an asset sits in the storage layout
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Slot {
    Media(MediaKind),
    Avatar,
}

/// A fetched-and-stored asset
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaAsset {
    /// Origin URL
    pub origin_url: String,
    /// Object key the asset was written to
    pub cached_key: String,
    /// Stored MIME type
    pub content_type: String,
}

/// Copies origin assets into object storage
pub struct MediaCacheService {
    client: reqwest::Client,
    store: Arc<dyn ObjectStore>,
    storage: StorageConfig,
    concurrency: usize,
    max_asset_bytes: u64,
}

impl MediaCacheService {
    /// Create a service writing to `store`
    pub fn new(
        store: Arc<dyn ObjectStore>,
        storage: StorageConfig,
        archive: &ArchiveConfig,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(archive.fetch_timeout)
            .build()
            .map_err(|e| Error::Config {
                message: format!("Failed to create HTTP client: {}", e),
                key: Some("archive.fetch_timeout".to_string()),
            })?;

        Ok(Self {
            client,
            store,
            storage,
            concurrency: archive.media_concurrency.max(1),
            max_asset_bytes: archive.max_asset_bytes,
        })
    }

    /// Re-host media and avatars for `content_id`
    ///
    /// Returns a map from origin URL to public cached URL. Assets that could not
    /// be fetched or stored are absent from the map.
    pub async fn cache_assets(
        &self,
        content_id: &str,
        media: &[MediaDescriptor],
        avatars: &[String],
    ) -> HashMap<String, String> {
        let plan = plan_keys(content_id, media, avatars);
        let total = plan.len();

        let assets: Vec<MediaAsset> = stream::iter(plan)
            .map(|(url, key)| async move { self.cache_one(content_id, url, key).await })
            .buffer_unordered(self.concurrency)
            .filter_map(|asset| async move { asset })
            .collect()
            .await;

        tracing::info!(
            content_id,
            cached = assets.len(),
            total,
            "Media caching finished"
        );

        assets
            .into_iter()
            .map(|asset| {
                let public = self.storage.public_url(&asset.cached_key);
                (asset.origin_url, public)
            })
            .collect()
    }

    async fn cache_one(&self, content_id: &str, url: String, key: String) -> Option<MediaAsset> {
        match self.fetch_and_store(&url, &key).await {
            Ok(content_type) => Some(MediaAsset {
                origin_url: url,
                cached_key: key,
                content_type,
            }),
            Err(e) => {
                tracing::warn!(
                    content_id,
                    url = %url,
                    key = %key,
                    error = %e,
                    "Skipping media asset"
                );
                None
            }
        }
    }

    async fn fetch_and_store(&self, url: &str, key: &str) -> Result<String> {
        let mut response = self.client.get(url).send().await.map_err(|e| Error::TransientFetch {
            target: url.to_string(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::TransientFetch {
                target: url.to_string(),
                reason: format!("origin returned {}", status),
            });
        }

        if let Some(len) = response.content_length()
            && len > self.max_asset_bytes
        {
            return Err(Error::PermanentSource {
                target: url.to_string(),
                reason: format!("asset is {} bytes, limit is {}", len, self.max_asset_bytes),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .or_else(|| content_type_for_key(key))
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        // Content-Length may be missing or wrong; enforce the limit while reading
        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| Error::TransientFetch {
            target: url.to_string(),
            reason: e.to_string(),
        })? {
            if body.len() as u64 + chunk.len() as u64 > self.max_asset_bytes {
                return Err(Error::PermanentSource {
                    target: url.to_string(),
                    reason: format!("asset exceeds {} bytes", self.max_asset_bytes),
                });
            }
            body.extend_from_slice(&chunk);
        }
        let body: Bytes = body.freeze();

        self.store
            .put(key, body, PutOptions::immutable(content_type.clone()))
            .await?;

        Ok(content_type)
    }
}

/// Assign a storage key to every distinct origin URL
///
/// The same URL is fetched once even if it appears several times. When two
/// different URLs derive the same key, the later one gets a hash-based name.
fn plan_keys(
    content_id: &str,
    media: &[MediaDescriptor],
    avatars: &[String],
) -> Vec<(String, String)> {
    let slots = media
        .iter()
        .map(|m| (m.url.as_str(), Slot::Media(m.kind)))
        .chain(avatars.iter().map(|a| (a.as_str(), Slot::Avatar)));

    let mut seen_urls = HashSet::new();
    let mut used_keys = HashSet::new();
    let mut plan = Vec::new();

    for (url, slot) in slots {
        if url.is_empty() || !seen_urls.insert(url) {
            continue;
        }

        let mut key = storage_key(content_id, slot, &derive_filename(url));
        if used_keys.contains(&key) {
            key = storage_key(content_id, slot, &hashed_filename(url, &key));
        }
        if validate_key(&key).is_err() {
            tracing::warn!(content_id, url, key = %key, "Skipping asset with unusable key");
            continue;
        }

        used_keys.insert(key.clone());
        plan.push((url.to_string(), key));
    }

    plan
}

fn storage_key(content_id: &str, slot: Slot, filename: &str) -> String {
    match slot {
        Slot::Media(kind) if kind.is_video() => format!("videos/{}/{}", content_id, filename),
        Slot::Media(_) => format!("images/{}/media/{}", content_id, filename),
        Slot::Avatar => format!("images/{}/avatar/{}", content_id, filename),
    }
}

/// Derive a storage-safe filename from an origin URL
///
/// Uses the last path segment restricted to `[A-Za-z0-9._-]`. A `format=` query
/// parameter supplies the extension when the segment has none. Falls back to the
/// first 16 hex characters of the URL's SHA-256.
pub fn derive_filename(url: &str) -> String {
    let parsed = url::Url::parse(url).ok();

    let segment = parsed
        .as_ref()
        .and_then(|u| u.path_segments())
        .and_then(|mut segments| segments.next_back())
        .map(sanitize)
        .unwrap_or_default();

    let format = parsed.as_ref().and_then(|u| {
        u.query_pairs()
            .find(|(k, _)| k == "format")
            .map(|(_, v)| sanitize(&v))
            .filter(|v| !v.is_empty() && !v.contains('.'))
    });

    let mut name = if segment.chars().all(|c| c == '.') {
        String::new()
    } else {
        segment
    };

    if name.is_empty() {
        name = url_hash(url);
    }
    if let Some(format) = format
        && !name.contains('.')
    {
        name = format!("{}.{}", name, format);
    }
    name
}

fn hashed_filename(url: &str, colliding_key: &str) -> String {
    let ext = colliding_key
        .rsplit_once('/')
        .map(|(_, name)| name)
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| format!(".{}", ext))
        .unwrap_or_default();
    format!("{}{}", url_hash(url), ext)
}

fn url_hash(url: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    let hex = format!("{:x}", hasher.finalize());
    hex[..16].to_string()
}

fn sanitize(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect()
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryObjectStore;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(store: Arc<MemoryObjectStore>, archive: ArchiveConfig) -> MediaCacheService {
        let storage = StorageConfig {
            public_base_url: "https://cdn.example.com/media/".to_string(),
            ..StorageConfig::default()
        };
        MediaCacheService::new(store, storage, &archive).unwrap()
    }

    #[test]
    fn test_derive_filename() {
        assert_eq!(derive_filename("https://pbs.example.com/media/abc.jpg"), "abc.jpg");
        assert_eq!(
            derive_filename("https://pbs.example.com/media/abc?format=jpg&name=large"),
            "abc.jpg"
        );
        assert_eq!(
            derive_filename("https://pbs.example.com/media/abc.png?format=jpg"),
            "abc.png"
        );
        assert_eq!(
            derive_filename("https://video.example.com/v/a%20b$c.mp4?tag=12"),
            "a20bc.mp4"
        );

        let hashed = derive_filename("https://pbs.example.com/");
        assert_eq!(hashed.len(), 16);
        assert!(hashed.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(derive_filename("https://pbs.example.com/"), hashed);
    }

    #[test]
    fn test_plan_keys_layout_and_dedup() {
        let media = vec![
            MediaDescriptor::new("https://pbs/media/p.jpg", MediaKind::Photo),
            MediaDescriptor::new("https://video/v.mp4", MediaKind::Video),
            MediaDescriptor::new("https://video/g.mp4", MediaKind::AnimatedGif),
            MediaDescriptor::new("https://pbs/media/p.jpg", MediaKind::Photo),
        ];
        let avatars = vec!["https://pbs/profile/a_bigger.jpg".to_string()];

        let plan = plan_keys("42", &media, &avatars);
        let keys: Vec<&str> = plan.iter().map(|(_, k)| k.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "images/42/media/p.jpg",
                "videos/42/v.mp4",
                "videos/42/g.mp4",
                "images/42/avatar/a_bigger.jpg",
            ]
        );
    }

    #[test]
    fn test_plan_keys_resolves_collisions() {
        let media = vec![
            MediaDescriptor::new("https://a.example.com/x/img.jpg", MediaKind::Photo),
            MediaDescriptor::new("https://b.example.com/y/img.jpg", MediaKind::Photo),
        ];
        let plan = plan_keys("1", &media, &[]);
        assert_eq!(plan[0].1, "images/1/media/img.jpg");
        assert_ne!(plan[1].1, plan[0].1);
        assert!(plan[1].1.starts_with("images/1/media/"));
        assert!(plan[1].1.ends_with(".jpg"));
    }

    #[tokio::test]
    async fn test_cache_assets_stores_and_maps_urls() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/media/p.jpg"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/jpeg")
                    .set_body_bytes(vec![1u8; 64]),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/profile/a_bigger.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![2u8; 8]))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryObjectStore::new());
        let svc = service(store.clone(), ArchiveConfig::default());

        let photo = format!("{}/media/p.jpg", server.uri());
        let avatar = format!("{}/profile/a_bigger.png", server.uri());
        let map = svc
            .cache_assets(
                "7",
                &[
                    MediaDescriptor::new(&photo, MediaKind::Photo),
                    MediaDescriptor::new(&photo, MediaKind::Photo),
                ],
                std::slice::from_ref(&avatar),
            )
            .await;

        assert_eq!(
            map.get(&photo).map(String::as_str),
            Some("https://cdn.example.com/media/images/7/media/p.jpg")
        );
        assert_eq!(
            map.get(&avatar).map(String::as_str),
            Some("https://cdn.example.com/media/images/7/avatar/a_bigger.png")
        );
        assert_eq!(store.put_count(), 2);

        let meta = store.head("images/7/media/p.jpg").await.unwrap().unwrap();
        assert_eq!(meta.size, 64);
        assert_eq!(meta.content_type.as_deref(), Some("image/jpeg"));
        assert_eq!(
            meta.cache_control.as_deref(),
            Some(crate::storage::IMMUTABLE_CACHE_CONTROL)
        );

        // No content-type header: guessed from the extension
        let meta = store
            .head("images/7/avatar/a_bigger.png")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(meta.content_type.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_failed_and_oversized_assets_are_omitted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone.jpg"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/big.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 2048]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ok.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 16]))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryObjectStore::new());
        let svc = service(
            store.clone(),
            ArchiveConfig {
                max_asset_bytes: 1024,
                ..ArchiveConfig::default()
            },
        );

        let gone = format!("{}/gone.jpg", server.uri());
        let big = format!("{}/big.mp4", server.uri());
        let ok = format!("{}/ok.jpg", server.uri());
        let map = svc
            .cache_assets(
                "1",
                &[
                    MediaDescriptor::new(&gone, MediaKind::Photo),
                    MediaDescriptor::new(&big, MediaKind::Video),
                    MediaDescriptor::new(&ok, MediaKind::Photo),
                ],
                &[],
            )
            .await;

        assert_eq!(map.len(), 1);
        assert!(map.contains_key(&ok));
        assert_eq!(store.keys().await, vec!["images/1/media/ok.jpg".to_string()]);
    }
}
