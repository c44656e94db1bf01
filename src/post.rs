//! Typed post model
//!
//! The content provider returns loosely-typed JSON. It is validated into
//! [`PostDetail`] once, at ingestion, and everything downstream (media caching,
//! rendering, persistence) works on the typed form.

use crate::types::SnapshotFlags;
use crate::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;
use utoipa::ToSchema;

/// A post as returned by the content provider
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PostDetail {
    /// Post identifier (the provider may send a string or a number)
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// Post text
    #[serde(default)]
    pub text: String,
    /// Author, if the provider exposes one
    #[serde(default)]
    pub author: Option<Author>,
    /// Attached media in display order
    #[serde(default)]
    pub media: Vec<MediaItem>,
    /// Quoted post
    #[serde(default, alias = "quoted_tweet")]
    #[schema(value_type = Option<Object>)]
    pub quoted: Option<Box<PostDetail>>,
    /// Engagement counters
    #[serde(default)]
    pub metrics: Option<Metrics>,
    /// Provider-formatted creation time
    #[serde(default)]
    pub created_at: Option<String>,
    /// Link to the live post
    #[serde(default)]
    pub url: Option<String>,
}

/// Post author
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Author {
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Handle without the leading `@`
    #[serde(default)]
    pub screen_name: String,
    /// Avatar URL
    #[serde(default)]
    pub profile_image_url: Option<String>,
}

/// Kind of attached media
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// Still image
    Photo,
    /// Video with audio
    Video,
    /// Looping silent video
    AnimatedGif,
}

impl MediaKind {
    /// Videos and gifs are stored under the `videos/` prefix
    pub fn is_video(&self) -> bool {
        matches!(self, MediaKind::Video | MediaKind::AnimatedGif)
    }
}

/// One attached media item
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MediaItem {
    /// Kind of media
    #[serde(rename = "type")]
    pub kind: MediaKind,
    /// Full-size asset URL
    pub url: String,
    /// Still preview (video poster)
    #[serde(default)]
    pub preview_url: Option<String>,
    /// Pixel width
    #[serde(default)]
    pub width: Option<u32>,
    /// Pixel height
    #[serde(default)]
    pub height: Option<u32>,
}

/// Engagement counters
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Metrics {
    /// Reply count
    #[serde(default)]
    pub replies: u64,
    /// Repost count
    #[serde(default, alias = "retweets")]
    pub reposts: u64,
    /// Like count
    #[serde(default)]
    pub likes: u64,
    /// View count, when the provider reports it
    #[serde(default)]
    pub views: Option<u64>,
}

/// A reply captured alongside a snapshot
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Comment {
    /// Display name or handle of the commenter
    pub author: String,
    /// Comment text
    pub text: String,
    /// Provider-formatted creation time
    #[serde(default)]
    pub created_at: Option<String>,
}

impl PostDetail {
    /// Validate provider JSON into a typed post
    ///
    /// Unknown fields are ignored; fields of the wrong type are rejected.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let post: PostDetail = serde_json::from_value(value)
            .map_err(|e| Error::InvalidPayload(format!("post detail: {}", e)))?;
        if post.id.is_empty() {
            return Err(Error::InvalidPayload("post detail: empty id".to_string()));
        }
        Ok(post)
    }

    /// Content flags for this post and its quoted post
    pub fn flags(&self) -> SnapshotFlags {
        let all_media = || self.media.iter().chain(self.quoted_media());
        SnapshotFlags {
            has_media: all_media().next().is_some(),
            has_video: all_media().any(|m| m.kind.is_video()),
            has_quoted: self.quoted.is_some(),
        }
    }

    fn quoted_media(&self) -> impl Iterator<Item = &MediaItem> {
        self.quoted.iter().flat_map(|q| q.media.iter())
    }

    /// Post media followed by quoted-post media
    pub fn all_media(&self) -> Vec<&MediaItem> {
        self.media.iter().chain(self.quoted_media()).collect()
    }

    /// Avatar URLs for the author and the quoted author, normalized to the
    /// higher-resolution variant
    pub fn avatar_urls(&self) -> Vec<String> {
        let mut urls = Vec::new();
        let authors = std::iter::once(self.author.as_ref())
            .chain(std::iter::once(self.quoted.as_ref().and_then(|q| q.author.as_ref())));
        for author in authors.flatten() {
            if let Some(url) = &author.profile_image_url
                && !url.is_empty()
            {
                let normalized = normalize_avatar_url(url);
                if !urls.contains(&normalized) {
                    urls.push(normalized);
                }
            }
        }
        urls
    }

    /// Replace origin URLs with their cached counterparts
    ///
    /// Avatar URLs are looked up by their normalized form, so a cached avatar
    /// replaces the low-resolution original. URLs missing from the map are left
    /// pointing at the origin.
    pub fn rewrite_urls(&mut self, cached: &HashMap<String, String>) {
        for item in &mut self.media {
            if let Some(url) = cached.get(&item.url) {
                item.url = url.clone();
            }
            if let Some(preview) = &mut item.preview_url
                && let Some(url) = cached.get(preview.as_str())
            {
                *preview = url.clone();
            }
        }

        if let Some(author) = &mut self.author
            && let Some(avatar) = &mut author.profile_image_url
            && let Some(url) = cached.get(&normalize_avatar_url(avatar))
        {
            *avatar = url.clone();
        }

        if let Some(quoted) = &mut self.quoted {
            quoted.rewrite_urls(cached);
        }
    }
}

/// Swap an avatar's low-resolution size suffix for the `_bigger` variant
///
/// `.../photo_normal.jpg` becomes `.../photo_bigger.jpg`; `_mini` is treated the
/// same way. URLs without a recognized suffix are returned unchanged.
pub fn normalize_avatar_url(url: &str) -> String {
    static SIZE_SUFFIX: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = SIZE_SUFFIX
        .get_or_init(|| Regex::new(r"_(normal|mini)(\.[A-Za-z0-9]+)?(\?.*)?$").ok());

    match pattern {
        Some(re) => re.replace(url, "_bigger$2$3").into_owned(),
        None => url.to_string(),
    }
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(u64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}
