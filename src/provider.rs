//! Content detail provider
//!
//! The archival pipeline only needs "fetch post detail by id". [`ContentProvider`]
//! is that capability; [`HttpContentProvider`] implements it against an HTTP
//! endpoint returning the post as JSON.

use crate::config::ProviderConfig;
use crate::post::PostDetail;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::StatusCode;

/// Fetches live post details
#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// Fetch one post by id
    ///
    /// Missing or deleted posts are [`Error::PermanentSource`]; rate limiting,
    /// server errors and network failures are [`Error::TransientFetch`].
    async fn fetch_post(&self, content_id: &str) -> Result<PostDetail>;
}

/// [`ContentProvider`] backed by `GET {base_url}/posts/{id}`
pub struct HttpContentProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpContentProvider {
    /// Build a provider client from configuration
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config {
                message: format!("Failed to create HTTP client: {}", e),
                key: Some("provider".to_string()),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn post_url(&self, content_id: &str) -> String {
        format!("{}/posts/{}", self.base_url, content_id)
    }
}

#[async_trait]
impl ContentProvider for HttpContentProvider {
    async fn fetch_post(&self, content_id: &str) -> Result<PostDetail> {
        let mut request = self.client.get(self.post_url(content_id));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            let reason = if e.is_timeout() {
                "request timed out".to_string()
            } else if e.is_connect() {
                format!("connection failed: {}", e)
            } else {
                e.to_string()
            };
            Error::TransientFetch {
                target: content_id.to_string(),
                reason,
            }
        })?;

        let status = response.status();
        match status {
            s if s.is_success() => {}
            StatusCode::NOT_FOUND | StatusCode::GONE => {
                return Err(Error::PermanentSource {
                    target: content_id.to_string(),
                    reason: format!("provider returned {}", status),
                });
            }
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(Error::TransientFetch {
                    target: content_id.to_string(),
                    reason: "rate limited by provider".to_string(),
                });
            }
            s if s.is_server_error() => {
                return Err(Error::TransientFetch {
                    target: content_id.to_string(),
                    reason: format!("provider returned {}", status),
                });
            }
            _ => {
                return Err(Error::PermanentSource {
                    target: content_id.to_string(),
                    reason: format!("provider rejected request with {}", status),
                });
            }
        }

        let value: serde_json::Value = response.json().await.map_err(|e| {
            Error::InvalidPayload(format!("provider response for {}: {}", content_id, e))
        })?;

        let post = PostDetail::from_value(value)?;
        tracing::debug!(
            content_id,
            media = post.media.len(),
            quoted = post.quoted.is_some(),
            "Fetched post detail"
        );
        Ok(post)
    }
}
