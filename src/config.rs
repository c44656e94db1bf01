//! Configuration types for tidyfeed-archive

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use utoipa::ToSchema;

/// Archival pipeline configuration
///
/// Passed explicitly into [`SnapshotOrchestrator`](crate::archive::SnapshotOrchestrator)
/// at construction time; the pipeline never consults the environment at call time.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ArchiveConfig {
    /// Whether archival triggers run at all (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum concurrent media fetches within one pipeline run (default: 4)
    #[serde(default = "default_media_concurrency")]
    pub media_concurrency: usize,

    /// Timeout for a single origin media fetch (default: 30 seconds)
    #[serde(default = "default_fetch_timeout", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub fetch_timeout: Duration,

    /// Largest origin asset that will be re-hosted, in bytes (default: 512 MiB)
    #[serde(default = "default_max_asset_bytes")]
    pub max_asset_bytes: u64,

    /// Render the comment list into snapshots (default: true)
    #[serde(default = "default_true")]
    pub include_comments: bool,

    /// Snapshot color theme (default: auto)
    #[serde(default)]
    pub theme: Theme,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            media_concurrency: default_media_concurrency(),
            fetch_timeout: default_fetch_timeout(),
            max_asset_bytes: default_max_asset_bytes(),
            include_comments: true,
            theme: Theme::default(),
        }
    }
}

/// Snapshot color theme
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    /// Always light
    Light,
    /// Always dark
    Dark,
    /// Follow the viewer's `prefers-color-scheme`
    #[default]
    Auto,
}

/// Content detail provider configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ProviderConfig {
    /// Base URL of the post detail API (default: "http://127.0.0.1:8787")
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,

    /// Optional bearer token sent with every request
    #[serde(default)]
    pub api_key: Option<String>,

    /// Request timeout (default: 20 seconds)
    #[serde(default = "default_provider_timeout", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_provider_base_url(),
            api_key: None,
            timeout: default_provider_timeout(),
        }
    }
}

/// Which object store implementation backs the service
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Files under [`StorageConfig::root`]
    #[default]
    Local,
    /// In-process map, lost on restart
    Memory,
}

/// Object storage configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct StorageConfig {
    /// Storage backend (default: local)
    #[serde(default)]
    pub backend: StorageBackend,

    /// Root directory for the local backend (default: "./media")
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,

    /// Public URL prefix under which cached objects are served
    /// (default: "http://127.0.0.1:6790/media")
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            root: default_storage_root(),
            public_base_url: default_public_base_url(),
        }
    }
}

impl StorageConfig {
    /// Public URL for an object key
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url.trim_end_matches('/'), key)
    }
}

/// Download queue configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct QueueConfig {
    /// Upper bound on jobs handed out by a single claim (default: 10)
    #[serde(default = "default_max_claim_batch")]
    pub max_claim_batch: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_claim_batch: default_max_claim_batch(),
        }
    }
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PersistenceConfig {
    /// Database path (default: "./tidyfeed-archive.db")
    #[serde(default = "default_database_path")]
    #[schema(value_type = String)]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// API and external server integration configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ServerIntegrationConfig {
    /// REST API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:6790)
    #[serde(default = "default_bind_address")]
    #[schema(value_type = String)]
    pub bind_address: SocketAddr,

    /// Shared secret workers present in `X-Service-Key`.
    /// Internal routes reject every request while this is unset.
    #[serde(default)]
    pub service_key: Option<String>,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            service_key: None,
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Out-of-process video worker configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct WorkerConfig {
    /// Base URL of the archive API (default: "http://127.0.0.1:6790")
    #[serde(default = "default_worker_api_base_url")]
    pub api_base_url: String,

    /// Shared secret sent as `X-Service-Key`
    #[serde(default)]
    pub service_key: String,

    /// Identifier recorded on claimed jobs (default: "worker-1")
    #[serde(default = "default_worker_id")]
    pub worker_id: String,

    /// Sleep between polls when the queue is empty (default: 5 seconds)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub poll_interval: Duration,

    /// Jobs requested per claim (default: 1)
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Path to yt-dlp (searched in PATH if None)
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub ytdlp_path: Option<PathBuf>,

    /// Hard limit for one download (default: 300 seconds)
    #[serde(default = "default_download_timeout", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub download_timeout: Duration,

    /// Retry policy for API calls
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_worker_api_base_url(),
            service_key: String::new(),
            worker_id: default_worker_id(),
            poll_interval: default_poll_interval(),
            batch_size: default_batch_size(),
            ytdlp_path: None,
            download_timeout: default_download_timeout(),
            retry: RetryConfig::default(),
        }
    }
}

/// Main configuration for [`ArchiveService`](crate::ArchiveService)
///
/// Fields are organized into logical sub-configs:
/// - [`archive`](ArchiveConfig) - pipeline switches, fan-out, rendering
/// - [`provider`](ProviderConfig) - content detail API
/// - [`storage`](StorageConfig) - object store backend and public URLs
/// - [`queue`](QueueConfig) - download job claiming
/// - [`persistence`](PersistenceConfig) - SQLite location
/// - [`server`](ServerIntegrationConfig) - REST API
/// - [`worker`](WorkerConfig) - the polling video worker
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Archival pipeline settings
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Content detail provider
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Object storage
    #[serde(default)]
    pub storage: StorageConfig,

    /// Download queue
    #[serde(default)]
    pub queue: QueueConfig,

    /// Data storage and state management
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// API and external server integration
    #[serde(default)]
    pub server: ServerIntegrationConfig,

    /// Video worker
    #[serde(default)]
    pub worker: WorkerConfig,
}

impl Config {
    /// Check values that would otherwise fail deep inside the pipeline
    pub fn validate(&self) -> Result<()> {
        if self.archive.media_concurrency == 0 {
            return Err(config_error(
                "media_concurrency must be at least 1",
                "archive.media_concurrency",
            ));
        }
        if self.queue.max_claim_batch == 0 {
            return Err(config_error(
                "max_claim_batch must be at least 1",
                "queue.max_claim_batch",
            ));
        }
        match url::Url::parse(&self.storage.public_base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => {
                return Err(config_error(
                    "public_base_url must be an absolute http(s) URL",
                    "storage.public_base_url",
                ));
            }
        }
        Ok(())
    }
}

fn config_error(message: &str, key: &str) -> Error {
    Error::Config {
        message: message.to_string(),
        key: Some(key.to_string()),
    }
}

fn default_true() -> bool {
    true
}

fn default_media_concurrency() -> usize {
    4
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_asset_bytes() -> u64 {
    512 * 1024 * 1024
}

fn default_provider_base_url() -> String {
    "http://127.0.0.1:8787".to_string()
}

fn default_provider_timeout() -> Duration {
    Duration::from_secs(20)
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("./media")
}

fn default_public_base_url() -> String {
    "http://127.0.0.1:6790/media".to_string()
}

fn default_max_claim_batch() -> u32 {
    10
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./tidyfeed-archive.db")
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 6790))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_worker_api_base_url() -> String {
    "http://127.0.0.1:6790".to_string()
}

fn default_worker_id() -> String {
    "worker-1".to_string()
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_batch_size() -> u32 {
    1
}

fn default_download_timeout() -> Duration {
    Duration::from_secs(300)
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
