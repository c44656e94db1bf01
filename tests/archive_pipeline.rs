//! End-to-end tests over a real socket
//!
//! A mock content provider stands in for the live post API and the object
//! store is a local directory, so every byte travels through the same paths it
//! would in production: trigger, background run, snapshot lookup, media
//! serving, and the worker protocol.

mod common;

use common::{
    PatternFetcher, SERVICE_KEY, TestServer, mount_post, pattern_bytes, wait_for_snapshot,
    worker_config,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tidyfeed_archive::{LocalObjectStore, Worker};

#[tokio::test]
async fn test_trigger_builds_servable_snapshot() {
    let server = TestServer::start().await;
    mount_post(&server.provider, "123").await;

    let response = server
        .http
        .post(server.url("/archive/123"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "submitted");

    let snapshot = wait_for_snapshot(&server.http, &server.base_url, "123", Duration::from_secs(10))
        .await
        .expect("snapshot should appear");
    assert_eq!(snapshot["snapshot_key"], "snapshots/123.html");
    assert_eq!(snapshot["has_video"], true);

    // Rewritten URLs point at this server and are directly fetchable
    let photo_url = snapshot["raw_data"]["media"][0]["url"].as_str().unwrap();
    assert_eq!(photo_url, server.url("/media/images/123/media/photo.jpg"));
    let photo = server.http.get(photo_url).send().await.unwrap();
    assert_eq!(photo.status(), reqwest::StatusCode::OK);
    assert_eq!(photo.headers()["content-type"], "image/jpeg");
    assert_eq!(photo.bytes().await.unwrap().to_vec(), pattern_bytes(32));

    let html = server
        .http
        .get(server.url("/media/snapshots/123.html"))
        .send()
        .await
        .unwrap();
    assert!(
        html.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/html")
    );
    let html = html.text().await.unwrap();
    assert!(html.contains(&server.url("/media/videos/123/clip.mp4")));
    assert!(html.contains("integration post"));

    server.stop().await;
}

#[tokio::test]
async fn test_repeat_trigger_keeps_single_snapshot() {
    let server = TestServer::start().await;
    mount_post(&server.provider, "77").await;

    for _ in 0..3 {
        let response = server
            .http
            .post(server.url("/archive/77"))
            .json(&json!({}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);
    }
    server.service.supervisor().wait_idle().await;

    assert_eq!(server.service.db().count_snapshots("77").await.unwrap(), 1);
    let first = wait_for_snapshot(&server.http, &server.base_url, "77", Duration::from_secs(5))
        .await
        .unwrap();

    // Forced re-run replaces the snapshot in place
    let response = server
        .http
        .post(server.url("/archive/77"))
        .json(&json!({"force": true, "comments": [{"author": "bob", "text": "nice"}]}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);
    server.service.supervisor().wait_idle().await;

    let second = wait_for_snapshot(&server.http, &server.base_url, "77", Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(first["created_at"], second["created_at"]);
    assert_eq!(second["comments_data"][0]["author"], "bob");
    assert_eq!(server.service.db().count_snapshots("77").await.unwrap(), 1);

    server.stop().await;
}

#[tokio::test]
async fn test_video_download_round_trip() {
    let server = TestServer::start().await;

    let response = server
        .http
        .post(server.url("/downloads"))
        .json(&json!({"owner": "alice", "source_url": "https://x.com/alice/status/555"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::CREATED);
    let job: serde_json::Value = response.json().await.unwrap();
    assert_eq!(job["status"], "pending");
    let id = job["id"].as_i64().unwrap();

    let worker = Worker::new(
        worker_config(&server.base_url),
        Arc::new(PatternFetcher {
            filename: "clip.mp4",
            len: 4096,
        }),
        Arc::new(LocalObjectStore::new(server.media_root())),
    )
    .unwrap();
    assert_eq!(worker.run_once().await.unwrap(), 1);
    assert_eq!(worker.run_once().await.unwrap(), 0, "queue is drained");

    let job: serde_json::Value = server
        .http
        .get(server.url(&format!("/downloads/{}", id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(job["status"], "completed");
    assert_eq!(job["storage_key"], "videos/555/clip.mp4");
    assert_eq!(job["size"], 4096);
    assert_eq!(job["worker_id"], "it-worker");
    assert_eq!(job["metadata"]["title"], "integration clip");

    let video = server
        .http
        .get(server.url("/media/videos/555/clip.mp4"))
        .header("Range", "bytes=0-9")
        .send()
        .await
        .unwrap();
    assert_eq!(video.status(), reqwest::StatusCode::PARTIAL_CONTENT);
    assert_eq!(video.headers()["content-range"], "bytes 0-9/4096");
    assert_eq!(video.bytes().await.unwrap().to_vec(), &pattern_bytes(4096)[..10]);

    let stats: serde_json::Value = server
        .http
        .get(server.url("/downloads/stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["completed"], 1);
    assert_eq!(stats["pending"], 0);

    server.stop().await;
}

#[tokio::test]
async fn test_internal_routes_require_service_key() {
    let server = TestServer::start().await;
    let claim = json!({"worker_id": "w", "limit": 1});

    let missing = server
        .http
        .post(server.url("/internal/jobs/claim"))
        .json(&claim)
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::UNAUTHORIZED);

    let wrong = server
        .http
        .post(server.url("/internal/jobs/claim"))
        .header("X-Service-Key", "not-the-key")
        .json(&claim)
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status(), reqwest::StatusCode::UNAUTHORIZED);

    let ok = server
        .http
        .post(server.url("/internal/jobs/claim"))
        .header("X-Service-Key", SERVICE_KEY)
        .json(&claim)
        .send()
        .await
        .unwrap();
    assert_eq!(ok.status(), reqwest::StatusCode::OK);

    server.stop().await;
}

#[tokio::test]
async fn test_shutdown_rejects_new_triggers() {
    let server = TestServer::start().await;
    let service = server.service.clone();
    server.stop().await;

    let err = service
        .orchestrator()
        .trigger(tidyfeed_archive::ArchiveRequest::new("1"))
        .unwrap_err();
    assert!(matches!(err, tidyfeed_archive::Error::ShuttingDown));
}
