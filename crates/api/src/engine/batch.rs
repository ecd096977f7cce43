//! Batch fan-out and lazily derived progress.
//!
//! A batch request is validated as a whole before anything is created.
//! Each item then gets its own retry loop; successful dispatches append
//! their experiment id to the batch record. Progress is recomputed from the
//! recorded experiments on every read, and the batch is marked `success`
//! the first time a read finds it complete.

use std::sync::Arc;

use chrono::Utc;
use labcoord_core::batch_progress::{compute_progress, counts_as_finished, BatchProgress};
use labcoord_core::error::CoreError;
use labcoord_core::options::{validate_all, OptionMap};
use labcoord_core::status::BATCH_SUCCESS;
use labcoord_core::types::DbId;
use labcoord_db::models::batch::{Batch, NewBatch};
use labcoord_db::models::experiment::Experiment;
use labcoord_db::RecordStore;
use serde::Serialize;

use crate::engine::dispatcher::JobDispatcher;
use crate::engine::retry::RetryOrchestrator;
use crate::error::{AppError, AppResult};

/// A batch together with its derived progress and recorded experiments.
#[derive(Debug, Clone, Serialize)]
pub struct BatchView {
    #[serde(flatten)]
    pub batch: Batch,
    pub progress: BatchProgress,
    pub experiments: Vec<Experiment>,
}

/// Creates batches and derives their progress.
pub struct BatchCoordinator {
    store: Arc<dyn RecordStore>,
    dispatcher: Arc<JobDispatcher>,
    retry: RetryOrchestrator,
}

impl BatchCoordinator {
    pub fn new(store: Arc<dyn RecordStore>, dispatcher: Arc<JobDispatcher>, retry: RetryOrchestrator) -> Self {
        Self {
            store,
            dispatcher,
            retry,
        }
    }

    /// Validate every item, create the batch, start one retry loop per
    /// item, and return the new batch without waiting for any dispatch.
    pub async fn submit_batch(
        &self,
        project_id: DbId,
        items: Vec<OptionMap>,
        retry_window_secs: u64,
    ) -> AppResult<Batch> {
        let project = self.dispatcher.load_project(project_id).await?;
        validate_all(&project.schema, &items)?;

        let num_experiments = i32::try_from(items.len())
            .map_err(|_| AppError::BadRequest("Too many experiments in batch".to_string()))?;
        let batch = self
            .store
            .insert_batch(&NewBatch {
                project_id,
                num_experiments,
            })
            .await?;
        tracing::info!(
            batch_id = batch.id,
            project_id,
            num_experiments,
            retry_window_secs,
            "Batch created"
        );

        for options in items {
            let store = Arc::clone(&self.store);
            let batch_id = batch.id;
            self.retry
                .dispatch_with_retry(project_id, options, retry_window_secs, move |handle| async move {
                    store
                        .append_batch_experiment(batch_id, handle.experiment_id)
                        .await?;
                    tracing::debug!(batch_id, experiment_id = handle.experiment_id, "Batch item dispatched");
                    Ok::<(), AppError>(())
                });
        }

        Ok(batch)
    }

    /// Read a batch, derive its progress, and record completion if reached.
    pub async fn refresh(&self, batch_id: DbId) -> AppResult<BatchView> {
        let mut batch = self
            .store
            .find_batch(batch_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Batch",
                id: batch_id,
            })?;

        let experiments = self.store.find_experiments(&batch.experiment_ids).await?;
        let finished = experiments
            .iter()
            .filter(|e| counts_as_finished(&e.status, e.best_fitness_score))
            .count();
        let declared = usize::try_from(batch.num_experiments).unwrap_or(0);
        let progress = compute_progress(declared, finished);

        if progress.is_complete() && batch.status != BATCH_SUCCESS {
            let now = Utc::now();
            if self.store.complete_batch(batch_id, now).await? > 0 {
                tracing::info!(batch_id, "Batch completed");
                batch.status = BATCH_SUCCESS.to_string();
                batch.finished_at = Some(now);
            } else if let Some(current) = self.store.find_batch(batch_id).await? {
                // Another reader completed it first.
                batch = current;
            }
        }

        Ok(BatchView {
            batch,
            progress,
            experiments,
        })
    }
}
