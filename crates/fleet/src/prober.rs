//! Capacity prober: first worker to report capacity wins.
//!
//! Every registered machine is queried concurrently. The first successful
//! answer is returned and the remaining in-flight probes are dropped with
//! the [`FuturesUnordered`] set. Failures, timeouts and "no capacity"
//! replies from other machines are only logged.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use labcoord_core::error::CoreError;
use labcoord_core::types::DbId;
use labcoord_db::models::machine::Machine;

use crate::api::WorkerClient;

/// The machine chosen for a dispatch.
#[derive(Debug, Clone)]
pub struct ProbeWinner {
    pub machine: Machine,
    /// Body of the machine's capacity reply.
    pub capacity: serde_json::Value,
}

/// Races capacity queries across the fleet.
#[derive(Clone)]
pub struct CapacityProber {
    workers: Arc<dyn WorkerClient>,
    probe_timeout: Duration,
}

impl CapacityProber {
    pub fn new(workers: Arc<dyn WorkerClient>, probe_timeout: Duration) -> Self {
        Self {
            workers,
            probe_timeout,
        }
    }

    pub fn workers(&self) -> &Arc<dyn WorkerClient> {
        &self.workers
    }

    /// Return the first of `machines` to report capacity for `project_id`.
    ///
    /// Fails with [`CoreError::NoCapacityAvailable`] when the fleet is empty
    /// or every probe fails.
    pub async fn probe(&self, machines: Vec<Machine>, project_id: DbId) -> Result<ProbeWinner, CoreError> {
        let fleet_size = machines.len();
        let mut probes: FuturesUnordered<_> = machines
            .into_iter()
            .map(|machine| {
                let workers = Arc::clone(&self.workers);
                let limit = self.probe_timeout;
                async move {
                    let reply =
                        tokio::time::timeout(limit, workers.capacity(&machine.address, project_id)).await;
                    (machine, reply)
                }
            })
            .collect();

        while let Some((machine, reply)) = probes.next().await {
            match reply {
                Ok(Ok(capacity)) => {
                    tracing::debug!(
                        machine_id = machine.id,
                        project_id,
                        abandoned = probes.len(),
                        "Machine reported capacity"
                    );
                    return Ok(ProbeWinner { machine, capacity });
                }
                Ok(Err(e)) => {
                    tracing::debug!(machine_id = machine.id, project_id, error = %e, "Capacity probe failed");
                }
                Err(_) => {
                    tracing::debug!(machine_id = machine.id, project_id, "Capacity probe timed out");
                }
            }
        }

        tracing::info!(project_id, fleet_size, "No machine capacity available");
        Err(CoreError::NoCapacityAvailable)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
