//! Server test utilities.

use super::fixtures::{BOUNDARY, multipart_body};
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use cask_core::config::AppConfig;
use cask_server::{AppState, create_router};
use serde_json::Value;
use std::path::PathBuf;
use tempfile::TempDir;
use tower::ServiceExt;

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with temporary storage.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let mut config = AppConfig::for_testing(temp_dir.path().join("data"));
        modifier(&mut config);

        cask_server::metrics::register_metrics();
        let backend = cask_storage::from_config(&config.storage, &config.signing)
            .await
            .expect("Failed to create storage backend");

        let state = AppState::with_backend(config, backend);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            _temp_dir: temp_dir,
        }
    }

    /// The data directory behind this server.
    pub fn data_dir(&self) -> PathBuf {
        self.state.config.storage.data_dir.clone()
    }

    /// Upload an extension through the multipart form endpoint.
    pub async fn upload(&self, name: &str, archive: &[u8]) -> (StatusCode, Value) {
        self.upload_raw(multipart_body(Some(name), Some(archive)))
            .await
    }

    /// POST a pre-encoded multipart body to /upload.
    pub async fn upload_raw(&self, body: Vec<u8>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();

        let status = response.status();
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);
        (status, json)
    }

    /// GET `uri` and return status, headers and raw body.
    pub async fn get(&self, uri: &str) -> (StatusCode, HeaderMap, Bytes) {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, body)
    }

    /// GET /updates.xml and return the document text.
    pub async fn feed_xml(&self) -> String {
        let (status, headers, body) = self.get("/updates.xml").await;
        assert_eq!(status, StatusCode::OK, "feed failed: {body:?}");
        assert_eq!(headers["content-type"], "text/xml");
        String::from_utf8(body.to_vec()).unwrap()
    }

    /// Version directories published for `app`.
    pub fn version_dirs(&self, app: &str) -> Vec<String> {
        let dir = self.data_dir().join("repo").join(app);
        let Ok(entries) = std::fs::read_dir(dir) else {
            return Vec::new();
        };
        let mut names: Vec<_> = entries
            .map(|e| e.unwrap())
            .filter(|e| e.file_type().unwrap().is_dir())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}
