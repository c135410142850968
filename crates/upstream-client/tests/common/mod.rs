//! In-process web-core server for integration tests.
//! Note: #[allow(dead_code)] because each test file compiles common/ separately.

use axum::body::Bytes;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Shards held by the test server, keyed by filehash
#[derive(Default)]
pub struct Store {
    shards: Mutex<HashMap<String, (String, Vec<u8>)>>,
    downloads: AtomicUsize,
}

#[allow(dead_code)]
impl Store {
    pub fn shard_data(&self, filehash: &str) -> Option<Vec<u8>> {
        self.shards
            .lock()
            .unwrap()
            .get(filehash)
            .map(|(_, data)| data.clone())
    }

    pub fn shard_count(&self) -> usize {
        self.shards.lock().unwrap().len()
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[allow(dead_code)]
pub struct TestServer {
    pub url: String,
    pub store: Arc<Store>,
    handle: JoinHandle<()>,
}

#[allow(dead_code)]
impl TestServer {
    /// A server that stores uploads and serves them back
    pub async fn start() -> Self {
        let store = Arc::new(Store::default());
        let router = Router::new()
            .route("/", get(|| async { "web-core test server" }))
            .route("/api/upload", post(upload))
            .route("/api/download/{filehash}", get(download))
            .with_state(store.clone());
        Self::serve(router, store).await
    }

    /// A server whose upload endpoint always answers with `status`
    pub async fn with_upload_status(status: u16) -> Self {
        let status = StatusCode::from_u16(status).unwrap();
        let router = Router::new()
            .route("/", get(|| async { "web-core test server" }))
            .route("/api/upload", post(move |_body: Bytes| async move { status }));
        Self::serve(router, Arc::new(Store::default())).await
    }

    async fn serve(router: Router, store: Arc<Store>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            url: format!("http://{}", addr),
            store,
            handle,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Hex SHA-256 of `data`
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// The key the test server hands out for a filehash
#[allow(dead_code)]
pub fn key_for(filehash: &str) -> String {
    sha256_hex(format!("key:{}", filehash).as_bytes())
}

/// Deterministic fixture bytes
#[allow(dead_code)]
pub fn fixture(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}

async fn upload(State(store): State<Arc<Store>>, mut multipart: Multipart) -> Response {
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("file") {
            continue;
        }
        let data = match field.bytes().await {
            Ok(data) => data.to_vec(),
            Err(_) => return StatusCode::BAD_REQUEST.into_response(),
        };

        let filehash = sha256_hex(&data);
        let key = key_for(&filehash);
        store
            .shards
            .lock()
            .unwrap()
            .insert(filehash.clone(), (key.clone(), data));

        let body = serde_json::json!({ "filehash": filehash, "key": key });
        return (StatusCode::CREATED, Json(body)).into_response();
    }
    StatusCode::BAD_REQUEST.into_response()
}

async fn download(
    State(store): State<Arc<Store>>,
    Path(filehash): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    store.downloads.fetch_add(1, Ordering::SeqCst);

    let shards = store.shards.lock().unwrap();
    match shards.get(&filehash) {
        Some((key, data)) if params.get("key") == Some(key) => data.clone().into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}
