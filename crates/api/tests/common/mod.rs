#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use labcoord_core::attachments::FileDescriptor;
use labcoord_core::options::OptionMap;
use labcoord_core::types::DbId;
use labcoord_db::{Blob, BlobStore, MemoryBlobStore, MemoryStore, StoreError, StoreResult};
use labcoord_events::EventBus;
use labcoord_fleet::{WorkerApiError, WorkerClient};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use labcoord_api::config::ServerConfig;
use labcoord_api::router::build_app_router;
use labcoord_api::state::AppState;

/// Build a test `ServerConfig` with safe defaults.
///
/// Timeouts are short so unreachable webhook receivers do not hold tests up.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        default_retry_window_secs: 1,
        probe_timeout_secs: 2,
        submit_timeout_secs: 2,
        webhook_timeout_secs: 2,
        max_upload_bytes: 10 * 1024 * 1024,
    }
}

// ---------------------------------------------------------------------------
// Scripted worker fleet
// ---------------------------------------------------------------------------

/// One job handed to a fake worker.
#[derive(Debug, Clone)]
pub struct Submission {
    pub address: String,
    pub project_id: DbId,
    pub options: OptionMap,
}

/// In-process [`WorkerClient`] whose replies are scripted per address.
///
/// Addresses report no capacity until [`FakeFleet::set_capacity`] is called.
#[derive(Default)]
pub struct FakeFleet {
    capacity: Mutex<HashMap<String, bool>>,
    rejecting: Mutex<bool>,
    submissions: Mutex<Vec<Submission>>,
}

impl FakeFleet {
    pub fn set_capacity(&self, address: &str, available: bool) {
        self.capacity.lock().unwrap().insert(address.to_string(), available);
    }

    /// Make every worker refuse submitted jobs.
    pub fn reject_submissions(&self, reject: bool) {
        *self.rejecting.lock().unwrap() = reject;
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkerClient for FakeFleet {
    async fn capacity(&self, address: &str, _project_id: DbId) -> Result<Value, WorkerApiError> {
        let available = self.capacity.lock().unwrap().get(address).copied().unwrap_or(false);
        if available {
            Ok(json!({ "address": address, "free_slots": 1 }))
        } else {
            Err(WorkerApiError::ApiError {
                status: 503,
                body: "busy".to_string(),
            })
        }
    }

    async fn submit(
        &self,
        address: &str,
        project_id: DbId,
        options: &OptionMap,
    ) -> Result<Value, WorkerApiError> {
        if *self.rejecting.lock().unwrap() {
            return Err(WorkerApiError::ApiError {
                status: 500,
                body: "worker refused the job".to_string(),
            });
        }
        self.submissions.lock().unwrap().push(Submission {
            address: address.to_string(),
            project_id,
            options: options.clone(),
        });
        Ok(json!({ "status": "accepted" }))
    }
}

// ---------------------------------------------------------------------------
// Scripted blob store
// ---------------------------------------------------------------------------

/// In-memory [`BlobStore`] whose writes and unlinks can be made to fail.
#[derive(Default)]
pub struct ScriptedBlobs {
    inner: MemoryBlobStore,
    failing_name: Mutex<Option<String>>,
    failing_unlinks: Mutex<bool>,
}

impl ScriptedBlobs {
    /// Refuse to write any blob called `filename`.
    pub fn fail_writes_named(&self, filename: &str) {
        *self.failing_name.lock().unwrap() = Some(filename.to_string());
    }

    pub fn fail_unlinks(&self, fail: bool) {
        *self.failing_unlinks.lock().unwrap() = fail;
    }

    pub async fn len(&self) -> usize {
        self.inner.len().await
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.is_empty().await
    }

    fn check_write(&self, filename: &str) -> StoreResult<()> {
        if self.failing_name.lock().unwrap().as_deref() == Some(filename) {
            return Err(disk_full());
        }
        Ok(())
    }
}

fn disk_full() -> StoreError {
    StoreError::Database(sqlx::Error::Io(std::io::Error::other("disk full")))
}

#[async_trait]
impl BlobStore for ScriptedBlobs {
    async fn create(&self, filename: &str, content_type: &str, data: &[u8]) -> StoreResult<FileDescriptor> {
        self.check_write(filename)?;
        self.inner.create(filename, content_type, data).await
    }

    async fn overwrite(
        &self,
        id: DbId,
        filename: &str,
        content_type: &str,
        data: &[u8],
    ) -> StoreResult<FileDescriptor> {
        self.check_write(filename)?;
        self.inner.overwrite(id, filename, content_type, data).await
    }

    async fn read(&self, id: DbId) -> StoreResult<Option<Blob>> {
        self.inner.read(id).await
    }

    async fn unlink(&self, id: DbId) -> StoreResult<()> {
        if *self.failing_unlinks.lock().unwrap() {
            return Err(disk_full());
        }
        self.inner.unlink(id).await
    }
}

// ---------------------------------------------------------------------------
// Test application
// ---------------------------------------------------------------------------

/// The full router over in-memory stores and a scripted fleet.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub blobs: Arc<ScriptedBlobs>,
    pub fleet: Arc<FakeFleet>,
    pub shutdown: CancellationToken,
}

/// Build the application with the same middleware stack production uses.
pub fn build_test_app() -> TestApp {
    let config = test_config();
    let store = Arc::new(MemoryStore::new());
    let blobs = Arc::new(ScriptedBlobs::default());
    let fleet = Arc::new(FakeFleet::default());
    let shutdown = CancellationToken::new();

    let state = AppState::new(
        config.clone(),
        store.clone(),
        blobs.clone(),
        fleet.clone(),
        Arc::new(EventBus::default()),
        shutdown.clone(),
    );
    let router = build_app_router(state.clone(), &config);

    TestApp {
        router,
        state,
        store,
        blobs,
        fleet,
        shutdown,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Create a project and return its id.
    pub async fn create_project(&self, schema: Value) -> DbId {
        let response = post_json(
            self,
            "/api/v1/projects",
            json!({ "name": "tuning", "schema": schema }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await["data"]["id"].as_i64().unwrap()
    }

    /// Register a machine and return its id.
    pub async fn register_machine(&self, address: &str) -> DbId {
        let response = post_json(
            self,
            "/api/v1/machines",
            json!({ "address": address, "hostname": address.trim_start_matches("http://") }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await["data"]["id"].as_i64().unwrap()
    }

    /// Poll `uri` until `done` accepts the JSON body, or panic after `limit`.
    pub async fn poll_until<F>(&self, uri: &str, limit: Duration, done: F) -> Value
    where
        F: Fn(&Value) -> bool,
    {
        let deadline = tokio::time::Instant::now() + limit;
        loop {
            let json = body_json(get(self, uri).await).await;
            if done(&json) {
                return json;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "condition on {uri} not met in time, last body: {json}"
            );
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }
}

/// Schema used by most dispatch tests.
pub fn trials_schema() -> Value {
    json!({
        "trials": { "type": "int" },
        "optim": { "type": "enum", "values": ["adam", "sgd"] }
    })
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: &TestApp, uri: &str) -> Response<Body> {
    app.send(Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn delete(app: &TestApp, uri: &str) -> Response<Body> {
    app.send(
        Request::builder()
            .method(Method::DELETE)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

pub async fn post_json(app: &TestApp, uri: &str, body: Value) -> Response<Body> {
    send_json(app, Method::POST, uri, body).await
}

pub async fn put_json(app: &TestApp, uri: &str, body: Value) -> Response<Body> {
    send_json(app, Method::PUT, uri, body).await
}

async fn send_json(app: &TestApp, method: Method, uri: &str, body: Value) -> Response<Body> {
    app.send(
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

pub const BOUNDARY: &str = "labcoord-test-boundary";

/// A part of a `multipart/form-data` body.
pub enum Part<'a> {
    Text { name: &'a str, value: &'a str },
    File { name: &'a str, filename: &'a str, content_type: &'a str, data: &'a [u8] },
}

/// Encode `parts` as a `multipart/form-data` body delimited by [`BOUNDARY`].
pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
                );
            }
            Part::File {
                name,
                filename,
                content_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                         Content-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub async fn send_multipart(app: &TestApp, method: Method, uri: &str, parts: &[Part<'_>]) -> Response<Body> {
    app.send(
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(multipart_body(parts)))
            .unwrap(),
    )
    .await
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
