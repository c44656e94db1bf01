//! Archive API server
//!
//! Runs the snapshot pipeline, download queue and media server behind the REST
//! API until SIGTERM/Ctrl+C. Settings come from the environment (a `.env` file
//! is honored):
//!
//! - `ARCHIVE_BIND` - listen address (default: 127.0.0.1:6790)
//! - `ARCHIVE_DATABASE` - SQLite path (default: ./tidyfeed-archive.db)
//! - `ARCHIVE_MEDIA_ROOT` - local object store root (default: ./media)
//! - `ARCHIVE_PUBLIC_BASE_URL` - public prefix for cached media
//! - `PROVIDER_BASE_URL` / `PROVIDER_API_KEY` - post detail API
//! - `SERVICE_KEY` - shared secret for `/internal/jobs`
//! - `ARCHIVE_ENABLED` - set to `false` to ignore archival triggers
//! - `RUST_LOG` - log filter (default: info)
//!
//! After starting:
//! - Swagger UI at http://127.0.0.1:6790/swagger-ui
//! - `curl -X POST http://127.0.0.1:6790/archive/1234567890`
//! - `curl http://127.0.0.1:6790/archive/1234567890`

use std::sync::Arc;
use tidyfeed_archive::{ArchiveService, Config, run_with_shutdown};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config_from_env()?;
    let bind = config.server.api.bind_address;

    let service = Arc::new(ArchiveService::new(config).await?);
    let api = service.spawn_api_server();

    println!("Archive API listening on http://{}", bind);
    println!("Swagger UI: http://{}/swagger-ui", bind);

    tokio::select! {
        result = run_with_shutdown(service.clone()) => result?,
        joined = api => {
            // Server exited on its own (bind failure, ...); still drain background work
            service.shutdown().await?;
            joined??;
        }
    }

    Ok(())
}

fn config_from_env() -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = Config::default();

    if let Ok(bind) = std::env::var("ARCHIVE_BIND") {
        config.server.api.bind_address = bind.parse()?;
    }
    if let Ok(path) = std::env::var("ARCHIVE_DATABASE") {
        config.persistence.database_path = path.into();
    }
    if let Ok(root) = std::env::var("ARCHIVE_MEDIA_ROOT") {
        config.storage.root = root.into();
    }
    config.storage.public_base_url = std::env::var("ARCHIVE_PUBLIC_BASE_URL")
        .unwrap_or_else(|_| format!("http://{}/media", config.server.api.bind_address));

    if let Ok(url) = std::env::var("PROVIDER_BASE_URL") {
        config.provider.base_url = url;
    }
    config.provider.api_key = std::env::var("PROVIDER_API_KEY").ok();
    config.server.api.service_key = std::env::var("SERVICE_KEY").ok();

    if let Ok(enabled) = std::env::var("ARCHIVE_ENABLED") {
        config.archive.enabled = enabled != "false" && enabled != "0";
    }

    config.validate()?;
    Ok(config)
}
