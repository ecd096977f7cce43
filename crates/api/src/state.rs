use std::sync::Arc;

use labcoord_db::{BlobStore, RecordStore};
use labcoord_events::{EventBus, WebhookDelivery, WebhookRegistry};
use labcoord_fleet::{CapacityProber, WorkerClient};
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::engine::{BatchCoordinator, JobDispatcher, RetryOrchestrator};

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Record store (PostgreSQL or in-memory).
    pub store: Arc<dyn RecordStore>,
    /// Experiment file contents.
    pub blobs: Arc<dyn BlobStore>,
    pub config: Arc<ServerConfig>,
    /// Lifecycle event bus; worker callbacks publish here.
    pub event_bus: Arc<EventBus>,
    pub webhooks: WebhookRegistry,
    pub dispatcher: Arc<JobDispatcher>,
    pub retry: RetryOrchestrator,
    pub batches: Arc<BatchCoordinator>,
}

impl AppState {
    /// Wire the engine together over the given stores and worker client.
    ///
    /// Retry loops stop when `shutdown` is cancelled.
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        workers: Arc<dyn WorkerClient>,
        event_bus: Arc<EventBus>,
        shutdown: CancellationToken,
    ) -> Self {
        let delivery = Arc::new(WebhookDelivery::new(config.webhook_timeout()));
        let webhooks = WebhookRegistry::new(Arc::clone(&event_bus), delivery);

        let prober = CapacityProber::new(workers, config.probe_timeout());
        let dispatcher = Arc::new(JobDispatcher::new(
            Arc::clone(&store),
            Arc::clone(&blobs),
            prober,
        ));
        let retry = RetryOrchestrator::new(Arc::clone(&dispatcher), shutdown);
        let batches = Arc::new(BatchCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&dispatcher),
            retry.clone(),
        ));

        Self {
            store,
            blobs,
            config: Arc::new(config),
            event_bus,
            webhooks,
            dispatcher,
            retry,
            batches,
        }
    }
}
