//! HTTP client for worker machines.
//!
//! Every worker exposes two endpoints per project:
//!
//! - `GET  {address}/projects/{project_id}/capacity`: 2xx when the worker
//!   can take another job, with a JSON body describing itself.
//! - `POST {address}/projects/{project_id}`: submit a job; the JSON body is
//!   the experiment's option map and a 2xx reply is the acknowledgement.

use std::time::Duration;

use async_trait::async_trait;
use labcoord_core::options::OptionMap;
use labcoord_core::types::DbId;

/// Errors from the worker HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum WorkerApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The worker returned a non-2xx status code.
    #[error("Worker API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

/// Operations the coordinator performs against a worker.
#[async_trait]
pub trait WorkerClient: Send + Sync {
    /// Ask the worker at `address` whether it has capacity for `project_id`.
    async fn capacity(&self, address: &str, project_id: DbId) -> Result<serde_json::Value, WorkerApiError>;

    /// Hand a job to the worker at `address`.
    async fn submit(
        &self,
        address: &str,
        project_id: DbId,
        options: &OptionMap,
    ) -> Result<serde_json::Value, WorkerApiError>;
}

/// [`WorkerClient`] over HTTP using [`reqwest`].
pub struct HttpWorkerClient {
    client: reqwest::Client,
    probe_timeout: Duration,
    submit_timeout: Duration,
}

impl HttpWorkerClient {
    pub fn new(probe_timeout: Duration, submit_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .gzip(true)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self::with_client(client, probe_timeout, submit_timeout)
    }

    /// Create a worker client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, probe_timeout: Duration, submit_timeout: Duration) -> Self {
        Self {
            client,
            probe_timeout,
            submit_timeout,
        }
    }

    // ---- private helpers ----

    fn project_url(address: &str, project_id: DbId) -> String {
        format!("{}/projects/{project_id}", address.trim_end_matches('/'))
    }

    /// Return the response unchanged on 2xx, otherwise an
    /// [`WorkerApiError::ApiError`] carrying the status and body text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, WorkerApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(WorkerApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful response body as JSON. An empty body is `null`.
    async fn parse_response(response: reqwest::Response) -> Result<serde_json::Value, WorkerApiError> {
        let response = Self::ensure_success(response).await?;
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&bytes).into_owned())))
    }
}

#[async_trait]
impl WorkerClient for HttpWorkerClient {
    async fn capacity(&self, address: &str, project_id: DbId) -> Result<serde_json::Value, WorkerApiError> {
        let response = self
            .client
            .get(format!("{}/capacity", Self::project_url(address, project_id)))
            .timeout(self.probe_timeout)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn submit(
        &self,
        address: &str,
        project_id: DbId,
        options: &OptionMap,
    ) -> Result<serde_json::Value, WorkerApiError> {
        let response = self
            .client
            .post(Self::project_url(address, project_id))
            .timeout(self.submit_timeout)
            .json(options)
            .send()
            .await?;

        Self::parse_response(response).await
    }
}
