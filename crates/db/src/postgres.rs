//! PostgreSQL-backed stores.

use async_trait::async_trait;
use labcoord_core::attachments::FileDescriptor;
use labcoord_core::types::{DbId, Timestamp};

use crate::models::batch::{Batch, NewBatch};
use crate::models::experiment::{Experiment, NewExperiment, UpdateExperiment};
use crate::models::machine::{Machine, MachineProjects, RegisterMachine};
use crate::models::project::{CreateProject, Project};
use crate::repositories::{BatchRepo, BlobRepo, ExperimentRepo, MachineRepo, ProjectRepo};
use crate::store::{Blob, BlobStore, RecordStore, StoreResult};
use crate::DbPool;

/// Record store over a PostgreSQL pool.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn health_check(&self) -> StoreResult<()> {
        crate::health_check(&self.pool).await?;
        Ok(())
    }

    async fn create_project(&self, input: &CreateProject) -> StoreResult<Project> {
        let schema_json = serde_json::to_string(&input.schema)?;
        Ok(ProjectRepo::create(&self.pool, input, &schema_json).await?)
    }

    async fn find_project(&self, id: DbId) -> StoreResult<Option<Project>> {
        Ok(ProjectRepo::find_by_id(&self.pool, id).await?)
    }

    async fn list_projects(&self) -> StoreResult<Vec<Project>> {
        Ok(ProjectRepo::list(&self.pool).await?)
    }

    async fn set_project_category(&self, id: DbId, category: &str) -> StoreResult<u64> {
        Ok(ProjectRepo::set_category(&self.pool, id, category).await?)
    }

    async fn register_machine(&self, input: &RegisterMachine) -> StoreResult<Machine> {
        Ok(MachineRepo::register(&self.pool, input).await?)
    }

    async fn find_machine(&self, id: DbId) -> StoreResult<Option<Machine>> {
        Ok(MachineRepo::find_by_id(&self.pool, id).await?)
    }

    async fn list_machines(&self) -> StoreResult<Vec<Machine>> {
        Ok(MachineRepo::list(&self.pool).await?)
    }

    async fn set_machine_projects(&self, id: DbId, projects: &MachineProjects) -> StoreResult<u64> {
        Ok(MachineRepo::set_projects(&self.pool, id, projects).await?)
    }

    async fn remove_machine(&self, id: DbId) -> StoreResult<u64> {
        Ok(MachineRepo::remove(&self.pool, id).await?)
    }

    async fn insert_experiment(&self, input: &NewExperiment) -> StoreResult<Experiment> {
        Ok(ExperimentRepo::insert(&self.pool, input).await?)
    }

    async fn find_experiment(&self, id: DbId) -> StoreResult<Option<Experiment>> {
        Ok(ExperimentRepo::find_by_id(&self.pool, id).await?)
    }

    async fn find_experiments(&self, ids: &[DbId]) -> StoreResult<Vec<Experiment>> {
        Ok(ExperimentRepo::find_by_ids(&self.pool, ids).await?)
    }

    async fn list_project_experiments(&self, project_id: DbId) -> StoreResult<Vec<Experiment>> {
        Ok(ExperimentRepo::list_by_project(&self.pool, project_id).await?)
    }

    async fn update_experiment(&self, id: DbId, patch: &UpdateExperiment) -> StoreResult<u64> {
        Ok(ExperimentRepo::update(&self.pool, id, patch).await?)
    }

    async fn set_experiment_started(&self, id: DbId, at: Timestamp) -> StoreResult<u64> {
        Ok(ExperimentRepo::set_started(&self.pool, id, at).await?)
    }

    async fn set_experiment_finished(&self, id: DbId, at: Timestamp) -> StoreResult<u64> {
        Ok(ExperimentRepo::set_finished(&self.pool, id, at).await?)
    }

    async fn claim_experiment_file(
        &self,
        id: DbId,
        offered: &FileDescriptor,
    ) -> StoreResult<Option<FileDescriptor>> {
        Ok(ExperimentRepo::claim_file(&self.pool, id, offered).await?)
    }

    async fn detach_experiment_file(&self, id: DbId, file_id: DbId) -> StoreResult<u64> {
        Ok(ExperimentRepo::detach_file(&self.pool, id, file_id).await?)
    }

    async fn clear_experiment_files(&self, id: DbId) -> StoreResult<Option<Vec<FileDescriptor>>> {
        Ok(ExperimentRepo::clear_files(&self.pool, id).await?)
    }

    async fn clear_project_files(&self, project_id: DbId) -> StoreResult<Vec<FileDescriptor>> {
        Ok(ExperimentRepo::clear_project_files(&self.pool, project_id).await?)
    }

    async fn remove_experiment(&self, id: DbId) -> StoreResult<Option<Experiment>> {
        Ok(ExperimentRepo::remove(&self.pool, id).await?)
    }

    async fn remove_project_experiments(&self, project_id: DbId) -> StoreResult<Vec<Experiment>> {
        Ok(ExperimentRepo::remove_by_project(&self.pool, project_id).await?)
    }

    async fn insert_batch(&self, input: &NewBatch) -> StoreResult<Batch> {
        Ok(BatchRepo::insert(&self.pool, input).await?)
    }

    async fn find_batch(&self, id: DbId) -> StoreResult<Option<Batch>> {
        Ok(BatchRepo::find_by_id(&self.pool, id).await?)
    }

    async fn append_batch_experiment(&self, batch_id: DbId, experiment_id: DbId) -> StoreResult<u64> {
        Ok(BatchRepo::append_experiment(&self.pool, batch_id, experiment_id).await?)
    }

    async fn complete_batch(&self, batch_id: DbId, at: Timestamp) -> StoreResult<u64> {
        Ok(BatchRepo::complete(&self.pool, batch_id, at).await?)
    }
}

/// Blob store keeping file contents in the `blobs` table.
#[derive(Clone)]
pub struct PgBlobStore {
    pool: DbPool,
}

impl PgBlobStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BlobStore for PgBlobStore {
    async fn create(&self, filename: &str, content_type: &str, data: &[u8]) -> StoreResult<FileDescriptor> {
        Ok(BlobRepo::create(&self.pool, filename, content_type, data).await?)
    }

    async fn overwrite(
        &self,
        id: DbId,
        filename: &str,
        content_type: &str,
        data: &[u8],
    ) -> StoreResult<FileDescriptor> {
        Ok(BlobRepo::overwrite(&self.pool, id, filename, content_type, data).await?)
    }

    async fn read(&self, id: DbId) -> StoreResult<Option<Blob>> {
        Ok(BlobRepo::find_by_id(&self.pool, id).await?)
    }

    async fn unlink(&self, id: DbId) -> StoreResult<()> {
        Ok(BlobRepo::delete(&self.pool, id).await?)
    }
}
