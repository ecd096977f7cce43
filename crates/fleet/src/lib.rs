//! Worker fleet access: the HTTP client for worker machines and the
//! capacity prober that picks a worker for each dispatch.

pub mod api;
pub mod prober;

pub use api::{HttpWorkerClient, WorkerApiError, WorkerClient};
pub use prober::{CapacityProber, ProbeWinner};
