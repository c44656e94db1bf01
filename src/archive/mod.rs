//! Snapshot orchestration
//!
//! [`SnapshotOrchestrator`] runs the archival pipeline for one post:
//!
//! 1. Skip if the post already has a snapshot (unless forced)
//! 2. Fetch the live post from the content provider
//! 3. Re-host its media, the quoted post's media and both authors' avatars
//! 4. Rewrite the post's URLs to the cached copies
//! 5. Render the snapshot HTML and store it at `snapshots/{content_id}.html`
//! 6. Upsert the snapshot row
//!
//! Any failure before step 6 leaves the row untouched. Media already written
//! stays in place and is overwritten by the next run. Runs started through
//! [`SnapshotOrchestrator::trigger`] are detached from the caller; their errors
//! are logged and never reported back.
//!
//! At most one triggered run per post is in flight. A trigger arriving while
//! one runs is either dropped (a plain trigger adds nothing) or folded into a
//! single follow-up run that starts when the current one ends: `force` flags
//! are OR-ed and the newest `comments` win.

use crate::config::ArchiveConfig;
use crate::db::{Database, SnapshotUpsert};
use crate::media_cache::{MediaCacheService, MediaDescriptor};
use crate::post::{Comment, MediaKind, PostDetail};
use crate::provider::ContentProvider;
use crate::render::{RenderOptions, render_snapshot};
use crate::storage::{ObjectStore, PutOptions};
use crate::tasks::TaskSupervisor;
use crate::types::ContentSnapshot;
use crate::{Error, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use utoipa::ToSchema;

/// Cache directive for rendered snapshots; a forced re-run replaces them in place
const SNAPSHOT_CACHE_CONTROL: &str = "public, max-age=300";

/// One archival request
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ArchiveRequest {
    /// Post identifier
    pub content_id: String,
    /// Re-run even if a snapshot exists
    #[serde(default)]
    pub force: bool,
    /// Comments to embed; `None` reuses whatever is stored
    #[serde(default)]
    pub comments: Option<Vec<Comment>>,
}

impl ArchiveRequest {
    /// Plain request for `content_id`
    pub fn new(content_id: impl Into<String>) -> Self {
        Self {
            content_id: content_id.into(),
            ..Self::default()
        }
    }

    /// Re-run even if a snapshot exists
    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    /// Embed these comments
    pub fn with_comments(mut self, comments: Vec<Comment>) -> Self {
        self.comments = Some(comments);
        self
    }
}

/// Result of one pipeline run
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArchiveOutcome {
    /// A snapshot already existed and nothing was done
    AlreadyCached {
        /// Existing snapshot key
        snapshot_key: String,
    },
    /// The snapshot was (re)built
    Cached {
        /// Snapshot key written
        snapshot_key: String,
        /// Assets successfully re-hosted
        media_cached: usize,
        /// Distinct assets attempted
        media_total: usize,
    },
}

/// What [`SnapshotOrchestrator::trigger`] did with a request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TriggerStatus {
    /// A background run was started
    Submitted,
    /// A run for the same post is already in flight and this trigger adds nothing to it
    Coalesced,
    /// A run for the same post is in flight; this trigger's `force`/`comments`
    /// are applied by one follow-up run after it
    Queued,
    /// Archival is disabled by configuration
    Disabled,
}

/// Deterministic storage key of a post's rendered snapshot
pub fn snapshot_key(content_id: &str) -> String {
    format!("snapshots/{}.html", content_id)
}

/// Post ids are embedded in storage keys, so only a safe alphabet is accepted
pub fn validate_content_id(content_id: &str) -> Result<()> {
    let valid = !content_id.is_empty()
        && content_id.len() <= 128
        && content_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(Error::InvalidPayload(format!(
            "content id {:?} must be 1-128 characters of [A-Za-z0-9_-]",
            content_id
        )));
    }
    Ok(())
}

/// Posts with a triggered run in flight, each with its merged follow-up if any
type InFlight = HashMap<String, Option<ArchiveRequest>>;

struct Inner {
    db: Arc<Database>,
    provider: Arc<dyn ContentProvider>,
    media: MediaCacheService,
    store: Arc<dyn ObjectStore>,
    config: ArchiveConfig,
    supervisor: Arc<TaskSupervisor>,
    in_flight: Mutex<InFlight>,
}

/// Runs the archival pipeline
#[derive(Clone)]
pub struct SnapshotOrchestrator {
    inner: Arc<Inner>,
}

impl SnapshotOrchestrator {
    /// Wire an orchestrator from its collaborators
    pub fn new(
        db: Arc<Database>,
        provider: Arc<dyn ContentProvider>,
        media: MediaCacheService,
        store: Arc<dyn ObjectStore>,
        config: ArchiveConfig,
        supervisor: Arc<TaskSupervisor>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                db,
                provider,
                media,
                store,
                config,
                supervisor,
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Archival configuration in effect
    pub fn config(&self) -> &ArchiveConfig {
        &self.inner.config
    }

    /// Stored snapshot for a post, if it has been cached
    pub async fn snapshot(&self, content_id: &str) -> Result<Option<ContentSnapshot>> {
        validate_content_id(content_id)?;
        self.inner
            .db
            .get_snapshot(content_id)
            .await?
            .map(ContentSnapshot::try_from)
            .transpose()
    }

    /// Start a background run and return immediately
    ///
    /// While a post's run is in flight, further triggers for it are coalesced
    /// or queued as one follow-up run (see the module docs).
    pub fn trigger(&self, request: ArchiveRequest) -> Result<TriggerStatus> {
        validate_content_id(&request.content_id)?;

        if !self.inner.config.enabled {
            tracing::info!(content_id = %request.content_id, "Archival disabled, ignoring trigger");
            return Ok(TriggerStatus::Disabled);
        }

        {
            let mut in_flight = self.inner.lock_in_flight();
            if let Some(follow_up) = in_flight.get_mut(&request.content_id) {
                return Ok(merge_follow_up(follow_up, request));
            }
            in_flight.insert(request.content_id.clone(), None);
        }

        let mut guard = InFlightGuard {
            inner: self.inner.clone(),
            content_id: request.content_id.clone(),
            released: false,
        };
        let orchestrator = self.clone();
        let name = format!("archive:{}", request.content_id);

        // On rejection the future is dropped unrun and its guard frees the slot
        self.inner.supervisor.submit(name, async move {
            let mut request = request;
            loop {
                let result = orchestrator.run_logged(request).await;
                let Some(next) = guard.next_or_release() else {
                    return result;
                };
                if let Err(e) = &result {
                    tracing::warn!(
                        content_id = %guard.content_id,
                        error = %e,
                        "Archival failed, running queued follow-up"
                    );
                }
                request = next;
            }
        })?;

        Ok(TriggerStatus::Submitted)
    }

    async fn run_logged(&self, request: ArchiveRequest) -> Result<()> {
        let content_id = request.content_id.clone();
        match self.run(request).await? {
            ArchiveOutcome::AlreadyCached { .. } => {
                tracing::debug!(content_id = %content_id, "Snapshot already cached");
            }
            ArchiveOutcome::Cached {
                snapshot_key,
                media_cached,
                media_total,
            } => {
                tracing::info!(
                    content_id = %content_id,
                    snapshot_key = %snapshot_key,
                    media_cached,
                    media_total,
                    "Snapshot cached"
                );
            }
        }
        Ok(())
    }

    /// Run the pipeline to completion
    pub async fn run(&self, request: ArchiveRequest) -> Result<ArchiveOutcome> {
        let ArchiveRequest {
            content_id,
            force,
            comments,
        } = request;
        validate_content_id(&content_id)?;
        let inner = &self.inner;

        if !force && let Some(existing) = inner.db.get_snapshot_key(&content_id).await? {
            return Ok(ArchiveOutcome::AlreadyCached {
                snapshot_key: existing,
            });
        }

        let mut post = inner.provider.fetch_post(&content_id).await?;

        let media = media_descriptors(&post);
        let avatars = post.avatar_urls();
        let media_total = media
            .iter()
            .map(|m| m.url.as_str())
            .chain(avatars.iter().map(String::as_str))
            .collect::<HashSet<_>>()
            .len();

        let cached = inner.media.cache_assets(&content_id, &media, &avatars).await;
        post.rewrite_urls(&cached);

        let render_comments = match &comments {
            Some(c) => c.clone(),
            None => self.stored_comments(&content_id).await?,
        };
        let options = RenderOptions {
            include_comments: inner.config.include_comments,
            theme: inner.config.theme,
        };
        let html = render_snapshot(&post, &render_comments, &options);

        let key = snapshot_key(&content_id);
        inner
            .store
            .put(
                &key,
                Bytes::from(html),
                PutOptions {
                    content_type: Some("text/html; charset=utf-8".to_string()),
                    cache_control: Some(SNAPSHOT_CACHE_CONTROL.to_string()),
                },
            )
            .await?;

        let raw_data = serde_json::to_string(&post)?;
        let comments_data = comments.as_ref().map(serde_json::to_string).transpose()?;
        inner
            .db
            .upsert_snapshot(&SnapshotUpsert {
                content_id: &content_id,
                raw_data: &raw_data,
                snapshot_key: &key,
                comments_data: comments_data.as_deref(),
                flags: post.flags(),
            })
            .await?;

        Ok(ArchiveOutcome::Cached {
            snapshot_key: key,
            media_cached: cached.len(),
            media_total,
        })
    }

    async fn stored_comments(&self, content_id: &str) -> Result<Vec<Comment>> {
        let Some(row) = self.inner.db.get_snapshot(content_id).await? else {
            return Ok(Vec::new());
        };
        let Some(raw) = row.comments_data else {
            return Ok(Vec::new());
        };
        Ok(serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(content_id, error = %e, "Ignoring unreadable stored comments");
            Vec::new()
        }))
    }
}

impl Inner {
    fn lock_in_flight(&self) -> std::sync::MutexGuard<'_, InFlight> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Fold a trigger into the follow-up slot of an in-flight post
fn merge_follow_up(slot: &mut Option<ArchiveRequest>, request: ArchiveRequest) -> TriggerStatus {
    if !request.force && request.comments.is_none() {
        tracing::debug!(content_id = %request.content_id, "Archival already in flight, coalescing");
        return TriggerStatus::Coalesced;
    }

    let merged = match slot.take() {
        Some(pending) => ArchiveRequest {
            force: pending.force || request.force,
            comments: request.comments.or(pending.comments),
            content_id: pending.content_id,
        },
        None => request,
    };
    tracing::debug!(
        content_id = %merged.content_id,
        force = merged.force,
        "Archival in flight, follow-up queued"
    );
    *slot = Some(merged);
    TriggerStatus::Queued
}

/// Holds a post's in-flight slot for the lifetime of its triggered runs
///
/// Dropping it without [`InFlightGuard::next_or_release`] having released the
/// slot (a panic, or a task that never started) frees it too.
struct InFlightGuard {
    inner: Arc<Inner>,
    content_id: String,
    released: bool,
}

impl InFlightGuard {
    /// Take the queued follow-up, or give up the slot if there is none
    ///
    /// Both happen under one lock, so a trigger racing with the end of a run is
    /// either picked up here or starts a run of its own.
    fn next_or_release(&mut self) -> Option<ArchiveRequest> {
        let mut in_flight = self.inner.lock_in_flight();
        let next = in_flight.get_mut(&self.content_id).and_then(Option::take);
        if next.is_none() {
            in_flight.remove(&self.content_id);
            self.released = true;
        }
        next
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if !self.released {
            self.inner.lock_in_flight().remove(&self.content_id);
        }
    }
}

/// Post and quoted-post media, with video posters cached as images
fn media_descriptors(post: &PostDetail) -> Vec<MediaDescriptor> {
    let mut descriptors = Vec::new();
    for item in post.all_media() {
        descriptors.push(MediaDescriptor::new(item.url.clone(), item.kind));
        if let Some(preview) = &item.preview_url {
            descriptors.push(MediaDescriptor::new(preview.clone(), MediaKind::Photo));
        }
    }
    descriptors
}
