use super::*;
use crate::Config;
use crate::config::StorageBackend;
use crate::db::Database;
use crate::provider::HttpContentProvider;
use crate::storage::MemoryObjectStore;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::MockServer;


const SERVICE_KEY: &str = "test-service-key";

/// Service wired to an in-memory store and a mock content provider
struct TestApp {
    service: Arc<ArchiveService>,
    config: Arc<Config>,
    store: Arc<MemoryObjectStore>,
    provider: MockServer,
    _temp_dir: TempDir,
}

impl TestApp {
    async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    async fn with_config(customize: impl FnOnce(&mut Config)) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let provider = MockServer::start().await;

        let mut config = Config::default();
        config.persistence.database_path = temp_dir.path().join("api.db");
        config.storage.backend = StorageBackend::Memory;
        config.storage.public_base_url = "https://cdn.test/media".to_string();
        config.provider.base_url = provider.uri();
        config.server.api.service_key = Some(SERVICE_KEY.to_string());
        customize(&mut config);

        let db = Arc::new(Database::new(&config.persistence.database_path).await.unwrap());
        let store = Arc::new(MemoryObjectStore::new());
        let content_provider = Arc::new(HttpContentProvider::new(&config.provider).unwrap());
        let config = Arc::new(config);

        let service = ArchiveService::with_components(
            (*config).clone(),
            db,
            store.clone(),
            content_provider,
        )
        .unwrap();

        Self {
            service: Arc::new(service),
            config,
            store,
            provider,
            _temp_dir: temp_dir,
        }
    }

    fn router(&self) -> Router {
        create_router(self.service.clone(), self.config.clone())
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router().oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str) -> Response {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn post_json(&self, uri: &str, body: serde_json::Value) -> Response {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    async fn post_internal(&self, uri: &str, body: serde_json::Value) -> Response {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .header("X-Service-Key", SERVICE_KEY)
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }
}

async fn body_bytes(response: Response) -> bytes::Bytes {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
}

async fn json_body(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn test_api_server_spawns() {
    let app = TestApp::with_config(|config| {
        // Port 0 = OS assigns a free port
        config.server.api.bind_address = "127.0.0.1:0".parse().unwrap();
    })
    .await;

    let api_handle = app.service.spawn_api_server();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(!api_handle.is_finished(), "server should still be listening");
    api_handle.abort();
}

#[tokio::test]
async fn test_cors_enabled() {
    let app = TestApp::with_config(|config| {
        config.server.api.cors_enabled = true;
        config.server.api.cors_origins = vec!["*".to_string()];
    })
    .await;

    let response = app
        .send(
            Request::builder()
                .uri("/health")
                .header("Origin", "http://localhost:3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin"),
        "CORS header should be present when CORS is enabled"
    );
}

#[tokio::test]
async fn test_cors_specific_origins() {
    let app = TestApp::with_config(|config| {
        config.server.api.cors_enabled = true;
        config.server.api.cors_origins = vec!["https://app.tidyfeed.test".to_string()];
    })
    .await;

    let allowed = app
        .send(
            Request::builder()
                .uri("/health")
                .header("Origin", "https://app.tidyfeed.test")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(
        allowed.headers()["access-control-allow-origin"],
        "https://app.tidyfeed.test"
    );

    let other = app
        .send(
            Request::builder()
                .uri("/health")
                .header("Origin", "https://evil.test")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert!(!other.headers().contains_key("access-control-allow-origin"));
}

#[tokio::test]
async fn test_cors_disabled() {
    let app = TestApp::with_config(|config| config.server.api.cors_enabled = false).await;

    let response = app
        .send(
            Request::builder()
                .uri("/health")
                .header("Origin", "http://localhost:3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert!(!response.headers().contains_key("access-control-allow-origin"));
}

#[tokio::test]
async fn test_public_routes_need_no_service_key() {
    let app = TestApp::new().await;

    assert_eq!(app.get("/health").await.status(), StatusCode::OK);
    assert_eq!(app.get("/downloads/stats").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_internal_routes_fail_closed_without_configured_key() {
    let app = TestApp::with_config(|config| config.server.api.service_key = None).await;

    let response = app
        .post_internal(
            "/internal/jobs/claim",
            serde_json::json!({"worker_id": "w1", "limit": 1}),
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
