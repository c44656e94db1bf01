//! Provider fixtures and fake fetchers

use async_trait::async_trait;
use serde_json::json;
use std::path::Path;
use tidyfeed_archive::Result;
use tidyfeed_archive::worker::{FetchedVideo, VideoFetcher};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Deterministic byte pattern of `len` bytes
pub fn pattern_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Mount a post with a photo, a video with poster and an avatar, plus their bytes
pub async fn mount_post(server: &MockServer, id: &str) {
    let base = server.uri();
    Mock::given(method("GET"))
        .and(path(format!("/posts/{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": id,
            "text": "integration post",
            "author": {"name": "Alice", "screen_name": "alice",
                       "profile_image_url": format!("{}/avatars/alice_normal.jpg", base)},
            "media": [
                {"type": "photo", "url": format!("{}/media/photo.jpg", base)},
                {"type": "video", "url": format!("{}/media/clip.mp4", base),
                 "preview_url": format!("{}/media/poster.jpg", base)}
            ]
        })))
        .mount(server)
        .await;

    for (p, body) in [
        ("/media/photo.jpg", pattern_bytes(32)),
        ("/media/clip.mp4", pattern_bytes(2048)),
        ("/media/poster.jpg", pattern_bytes(16)),
        ("/avatars/alice_bigger.jpg", pattern_bytes(8)),
    ] {
        Mock::given(method("GET"))
            .and(path(p))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(server)
            .await;
    }
}

/// Fetcher that "downloads" a fixed number of pattern bytes
pub struct PatternFetcher {
    pub filename: &'static str,
    pub len: usize,
}

#[async_trait]
impl VideoFetcher for PatternFetcher {
    async fn fetch(
        &self,
        _source_url: &str,
        _cookies_file: Option<&Path>,
        output_dir: &Path,
    ) -> Result<FetchedVideo> {
        let path = output_dir.join(self.filename);
        tokio::fs::write(&path, pattern_bytes(self.len)).await?;
        Ok(FetchedVideo {
            path,
            title: Some("integration clip".to_string()),
            duration: Some(3.0),
        })
    }

    fn name(&self) -> &'static str {
        "pattern"
    }
}
