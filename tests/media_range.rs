//! Range requests against the local object store over HTTP

mod common;

use bytes::Bytes;
use common::{TestServer, pattern_bytes};
use reqwest::StatusCode;
use tidyfeed_archive::ObjectStore;
use tidyfeed_archive::storage::PutOptions;

const KEY: &str = "videos/42/clip.mp4";
const SIZE: usize = 1000;

async fn server_with_video() -> (TestServer, Vec<u8>) {
    let server = TestServer::start().await;
    let body = pattern_bytes(SIZE);
    server
        .service
        .store()
        .put(KEY, Bytes::from(body.clone()), PutOptions::immutable("video/mp4"))
        .await
        .unwrap();
    (server, body)
}

async fn get(server: &TestServer, path: &str, range: Option<&str>) -> reqwest::Response {
    let mut request = server.http.get(server.url(path));
    if let Some(range) = range {
        request = request.header("Range", range);
    }
    request.send().await.unwrap()
}

#[tokio::test]
async fn test_range_variants() {
    let (server, body) = server_with_video().await;
    let path = format!("/media/{}", KEY);

    let full = get(&server, &path, None).await;
    assert_eq!(full.status(), StatusCode::OK);
    assert_eq!(full.headers()["accept-ranges"], "bytes");
    assert_eq!(full.headers()["content-length"], "1000");
    assert_eq!(full.bytes().await.unwrap().to_vec(), body);

    // (header, expected start, expected end inclusive)
    let cases = [
        ("bytes=0-99", 0, 99),
        ("bytes=500-", 500, 999),
        ("bytes=-100", 900, 999),
        ("bytes=990-5000", 990, 999),
        ("bytes=999-999", 999, 999),
    ];
    for (header, start, end) in cases {
        let response = get(&server, &path, Some(header)).await;
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT, "{header}");
        assert_eq!(
            response.headers()["content-range"],
            format!("bytes {}-{}/{}", start, end, SIZE).as_str(),
            "{header}"
        );
        assert_eq!(
            response.bytes().await.unwrap().to_vec(),
            &body[start..=end],
            "{header}"
        );
    }

    server.stop().await;
}

#[tokio::test]
async fn test_unsatisfiable_and_malformed_ranges() {
    let (server, body) = server_with_video().await;
    let path = format!("/media/{}", KEY);

    let response = get(&server, &path, Some("bytes=1000-")).await;
    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(response.headers()["content-range"], "bytes */1000");

    // Ranges this server does not understand get the whole object
    for header in ["bytes=0-1,5-6", "items=0-5", "bytes=9-3", "bytes=abc-"] {
        let response = get(&server, &path, Some(header)).await;
        assert_eq!(response.status(), StatusCode::OK, "{header}");
        assert_eq!(response.bytes().await.unwrap().to_vec(), body, "{header}");
    }

    server.stop().await;
}

#[tokio::test]
async fn test_missing_and_invalid_keys() {
    let (server, _body) = server_with_video().await;

    let missing = get(&server, "/media/videos/42/other.mp4", None).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let traversal = get(&server, "/media/..%2Farchive.db", None).await;
    assert_eq!(traversal.status(), StatusCode::BAD_REQUEST);

    server.stop().await;
}
