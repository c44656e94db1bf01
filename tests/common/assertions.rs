//! Polling helpers for asynchronous outcomes

use std::time::Duration;

/// Wait until `/health` answers, panicking after `timeout`
pub async fn wait_for_server(http: &reqwest::Client, base_url: &str, timeout: Duration) {
    let url = format!("{}/health", base_url);
    let ready = tokio::time::timeout(timeout, async {
        loop {
            if let Ok(response) = http.get(&url).send().await
                && response.status().is_success()
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(ready.is_ok(), "API server did not come up at {}", base_url);
}

/// Poll `GET /archive/{id}` until a snapshot exists
///
/// Returns the snapshot JSON, or `None` on timeout.
pub async fn wait_for_snapshot(
    http: &reqwest::Client,
    base_url: &str,
    content_id: &str,
    timeout: Duration,
) -> Option<serde_json::Value> {
    let url = format!("{}/archive/{}", base_url, content_id);
    tokio::time::timeout(timeout, async {
        loop {
            let response = http.get(&url).send().await.unwrap();
            if response.status() == reqwest::StatusCode::OK {
                return response.json::<serde_json::Value>().await.unwrap();
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    })
    .await
    .ok()
}
