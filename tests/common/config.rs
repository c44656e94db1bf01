//! Test configuration helpers and a real-socket API server

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tidyfeed_archive::config::{RetryConfig, StorageBackend};
use tidyfeed_archive::{ArchiveService, Config, WorkerConfig};
use wiremock::MockServer;

use super::assertions::wait_for_server;

/// Shared secret used by every test server
pub const SERVICE_KEY: &str = "integration-service-key";

/// Reserve a loopback address for the API server
pub fn free_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

/// Configuration with a local object store and database under `dir`
pub fn test_config(dir: &Path, provider_uri: &str, addr: SocketAddr) -> Config {
    let mut config = Config::default();
    config.persistence.database_path = dir.join("archive.db");
    config.storage.backend = StorageBackend::Local;
    config.storage.root = dir.join("media");
    config.storage.public_base_url = format!("http://{}/media", addr);
    config.provider.base_url = provider_uri.to_string();
    config.server.api.bind_address = addr;
    config.server.api.service_key = Some(SERVICE_KEY.to_string());
    config.archive.fetch_timeout = Duration::from_secs(5);
    config
}

/// Worker configuration pointing at `base_url`
pub fn worker_config(base_url: &str) -> WorkerConfig {
    WorkerConfig {
        api_base_url: base_url.to_string(),
        service_key: SERVICE_KEY.to_string(),
        worker_id: "it-worker".to_string(),
        poll_interval: Duration::from_millis(20),
        batch_size: 5,
        retry: RetryConfig {
            max_attempts: 2,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            backoff_multiplier: 2.0,
            jitter: false,
        },
        ..WorkerConfig::default()
    }
}

/// Archive service listening on a real socket
pub struct TestServer {
    pub service: Arc<ArchiveService>,
    pub base_url: String,
    pub provider: MockServer,
    pub http: reqwest::Client,
    pub dir: TempDir,
}

impl TestServer {
    pub async fn start() -> Self {
        let dir = TempDir::new().unwrap();
        let provider = MockServer::start().await;
        let addr = free_addr();
        let config = test_config(dir.path(), &provider.uri(), addr);

        let service = Arc::new(ArchiveService::new(config).await.unwrap());
        let _server = service.spawn_api_server();

        let base_url = format!("http://{}", addr);
        let http = reqwest::Client::new();
        wait_for_server(&http, &base_url, Duration::from_secs(5)).await;

        Self {
            service,
            base_url,
            provider,
            http,
            dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Root directory of the local object store
    pub fn media_root(&self) -> std::path::PathBuf {
        self.dir.path().join("media")
    }

    pub async fn stop(self) {
        self.service.shutdown().await.unwrap();
    }
}
