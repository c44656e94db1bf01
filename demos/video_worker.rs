//! Video download worker
//!
//! Polls the archive API for pending download jobs, fetches each video with
//! yt-dlp and writes it into the same local object store the API serves from.
//! Settings come from the environment (a `.env` file is honored):
//!
//! - `ARCHIVE_API_URL` - archive API base URL (default: http://127.0.0.1:6790)
//! - `SERVICE_KEY` - shared secret for `/internal/jobs` (required)
//! - `WORKER_ID` - identifier recorded on claimed jobs (default: worker-1)
//! - `ARCHIVE_MEDIA_ROOT` - local object store root (default: ./media)
//! - `YTDLP_PATH` - yt-dlp binary (searched in PATH if unset)
//! - `RUST_LOG` - log filter (default: info)

use std::sync::Arc;
use tidyfeed_archive::{LocalObjectStore, Worker, WorkerConfig, YtDlpFetcher, wait_for_signal};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut config = WorkerConfig {
        service_key: std::env::var("SERVICE_KEY").map_err(|_| "SERVICE_KEY not set in environment")?,
        ..WorkerConfig::default()
    };
    if let Ok(url) = std::env::var("ARCHIVE_API_URL") {
        config.api_base_url = url;
    }
    if let Ok(id) = std::env::var("WORKER_ID") {
        config.worker_id = id;
    }
    config.ytdlp_path = std::env::var("YTDLP_PATH").ok().map(Into::into);
    let media_root = std::env::var("ARCHIVE_MEDIA_ROOT").unwrap_or_else(|_| "./media".to_string());

    let fetcher = Arc::new(YtDlpFetcher::from_config(&config)?);
    println!("Using yt-dlp at {}", fetcher.binary_path().display());

    let worker = Worker::new(config, fetcher, Arc::new(LocalObjectStore::new(media_root)))?;

    let cancel = CancellationToken::new();
    let stop = cancel.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        stop.cancel();
    });

    worker.run(cancel).await?;
    Ok(())
}
