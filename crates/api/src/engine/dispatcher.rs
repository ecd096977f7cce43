//! Single-job dispatch.
//!
//! Steps run strictly in order: resolve project, validate options, probe
//! the fleet, persist the experiment, attach files, submit to the winning
//! worker. The experiment is created only once a worker has been chosen
//! and is removed again if file attachment or submission fails, so no
//! experiment survives without a worker having accepted it.

use std::sync::Arc;

use labcoord_core::attachments::FileDescriptor;
use labcoord_core::options::{validate_options, OptionMap};
use labcoord_core::error::CoreError;
use labcoord_core::types::DbId;
use labcoord_db::models::experiment::NewExperiment;
use labcoord_db::models::project::Project;
use labcoord_db::{BlobStore, RecordStore};
use labcoord_fleet::CapacityProber;
use serde::Serialize;

use crate::engine::attachments::{attach_files, unlink_logged, Upload};
use crate::error::{AppError, AppResult};

/// Option key carrying the experiment's own id in the worker payload.
pub const EXPERIMENT_ID_OPTION: &str = "_id";

/// Result of a successful dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct JobHandle {
    pub experiment_id: DbId,
    pub machine_id: DbId,
    /// Acknowledgement body returned by the worker.
    pub ack: serde_json::Value,
}

/// Dispatches jobs to the fleet.
pub struct JobDispatcher {
    store: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    prober: CapacityProber,
}

impl JobDispatcher {
    pub fn new(store: Arc<dyn RecordStore>, blobs: Arc<dyn BlobStore>, prober: CapacityProber) -> Self {
        Self {
            store,
            blobs,
            prober,
        }
    }

    /// Look up a project for submission; unknown ids are a bad request.
    pub async fn load_project(&self, project_id: DbId) -> AppResult<Project> {
        self.store
            .find_project(project_id)
            .await?
            .ok_or_else(|| AppError::unknown_project(project_id))
    }

    /// Dispatch one job for `project_id`.
    pub async fn dispatch(
        &self,
        project_id: DbId,
        mut options: OptionMap,
        files: Vec<Upload>,
    ) -> AppResult<JobHandle> {
        let project = self.load_project(project_id).await?;
        validate_options(&project.schema, &options)?;

        let machines = self.store.list_machines().await?;
        let winner = self.prober.probe(machines, project_id).await?;

        let experiment = self
            .store
            .insert_experiment(&NewExperiment {
                project_id,
                machine_id: winner.machine.id,
                options: options.clone(),
            })
            .await?;
        tracing::debug!(
            experiment_id = experiment.id,
            machine_id = winner.machine.id,
            project_id,
            "Experiment created"
        );

        options.insert(
            EXPERIMENT_ID_OPTION.to_string(),
            serde_json::Value::String(experiment.id.to_string()),
        );

        let attached = match attach_files(
            self.store.as_ref(),
            self.blobs.as_ref(),
            experiment.id,
            files,
        )
        .await
        {
            Ok(attached) => attached,
            Err(e) => {
                tracing::warn!(experiment_id = experiment.id, error = %e, "File attachment failed");
                self.discard(experiment.id, &[]).await;
                return Err(e);
            }
        };

        match self
            .prober
            .workers()
            .submit(&winner.machine.address, project_id, &options)
            .await
        {
            Ok(ack) => {
                tracing::info!(
                    experiment_id = experiment.id,
                    machine_id = winner.machine.id,
                    project_id,
                    "Experiment dispatched"
                );
                Ok(JobHandle {
                    experiment_id: experiment.id,
                    machine_id: winner.machine.id,
                    ack,
                })
            }
            Err(e) => {
                self.discard(experiment.id, &attached).await;
                Err(CoreError::DispatchRejected(e.to_string()).into())
            }
        }
    }

    /// Compensate a failed dispatch: remove the experiment and its blobs.
    async fn discard(&self, experiment_id: DbId, files: &[FileDescriptor]) {
        for file in files {
            unlink_logged(self.blobs.as_ref(), experiment_id, file.id).await;
        }
        match self.store.remove_experiment(experiment_id).await {
            Ok(_) => tracing::debug!(experiment_id, "Experiment removed after failed dispatch"),
            Err(e) => tracing::error!(experiment_id, error = %e, "Failed to remove experiment"),
        }
    }
}
