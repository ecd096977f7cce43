//! Storage boundary consumed by the dispatch engine.
//!
//! [`RecordStore`] covers ID-addressed CRUD and filtered reads over
//! projects, machines, experiments and batches. Every mutation is a single
//! atomic update keyed by record or project identity, so concurrent
//! dispatches never need application-level locking. [`BlobStore`] holds experiment input and
//! output files.
//!
//! Two implementations exist: PostgreSQL ([`crate::postgres`]) and an
//! in-process store ([`crate::memory`]) used for development and tests.

use async_trait::async_trait;
use labcoord_core::attachments::FileDescriptor;
use labcoord_core::types::{DbId, Timestamp};

use crate::models::batch::{Batch, NewBatch};
use crate::models::experiment::{Experiment, NewExperiment, UpdateExperiment};
use crate::models::machine::{Machine, MachineProjects, RegisterMachine};
use crate::models::project::{CreateProject, Project};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The underlying database query failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored JSON document could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Record store
// ---------------------------------------------------------------------------

/// Record store for the coordinator's four collections.
///
/// Update and remove operations return the number of affected records
/// (0 when the identity does not exist).
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Verify the backend is reachable.
    async fn health_check(&self) -> StoreResult<()>;

    // -- projects ----------------------------------------------------------

    async fn create_project(&self, input: &CreateProject) -> StoreResult<Project>;

    async fn find_project(&self, id: DbId) -> StoreResult<Option<Project>>;

    /// All projects ordered by name.
    async fn list_projects(&self) -> StoreResult<Vec<Project>>;

    async fn set_project_category(&self, id: DbId, category: &str) -> StoreResult<u64>;

    // -- machines ----------------------------------------------------------

    async fn register_machine(&self, input: &RegisterMachine) -> StoreResult<Machine>;

    async fn find_machine(&self, id: DbId) -> StoreResult<Option<Machine>>;

    /// All machines ordered by hostname.
    async fn list_machines(&self) -> StoreResult<Vec<Machine>>;

    async fn set_machine_projects(&self, id: DbId, projects: &MachineProjects) -> StoreResult<u64>;

    /// Deregister a machine. Experiments it ran keep their `machine_id`.
    async fn remove_machine(&self, id: DbId) -> StoreResult<u64>;

    // -- experiments -------------------------------------------------------

    /// Insert a `running` experiment with an empty file list.
    async fn insert_experiment(&self, input: &NewExperiment) -> StoreResult<Experiment>;

    async fn find_experiment(&self, id: DbId) -> StoreResult<Option<Experiment>>;

    /// Experiments whose ids are in `ids` (missing ids are skipped).
    async fn find_experiments(&self, ids: &[DbId]) -> StoreResult<Vec<Experiment>>;

    async fn list_project_experiments(&self, project_id: DbId) -> StoreResult<Vec<Experiment>>;

    /// Apply the non-`None` fields of `patch`.
    async fn update_experiment(&self, id: DbId, patch: &UpdateExperiment) -> StoreResult<u64>;

    async fn set_experiment_started(&self, id: DbId, at: Timestamp) -> StoreResult<u64>;

    async fn set_experiment_finished(&self, id: DbId, at: Timestamp) -> StoreResult<u64>;

    /// Attach `offered` unless an attachment with the same filename exists,
    /// in which case that attachment keeps its id and takes the offered
    /// content type. The name check and the write are one atomic update.
    ///
    /// Returns the descriptor now attached under the name, or `None` when
    /// the experiment does not exist.
    async fn claim_experiment_file(
        &self,
        id: DbId,
        offered: &FileDescriptor,
    ) -> StoreResult<Option<FileDescriptor>>;

    /// Drop the attachment with `file_id` from the experiment's list.
    async fn detach_experiment_file(&self, id: DbId, file_id: DbId) -> StoreResult<u64>;

    /// Empty the experiment's file list, returning the descriptors it held
    /// (`None` when the experiment does not exist).
    async fn clear_experiment_files(&self, id: DbId) -> StoreResult<Option<Vec<FileDescriptor>>>;

    /// Empty the file lists of every experiment in a project, returning
    /// the descriptors removed.
    async fn clear_project_files(&self, project_id: DbId) -> StoreResult<Vec<FileDescriptor>>;

    /// Delete an experiment, returning the removed record.
    async fn remove_experiment(&self, id: DbId) -> StoreResult<Option<Experiment>>;

    /// Delete every experiment of a project, returning the removed records.
    async fn remove_project_experiments(&self, project_id: DbId) -> StoreResult<Vec<Experiment>>;

    // -- batches -----------------------------------------------------------

    /// Insert a `running` batch started now.
    async fn insert_batch(&self, input: &NewBatch) -> StoreResult<Batch>;

    async fn find_batch(&self, id: DbId) -> StoreResult<Option<Batch>>;

    async fn append_batch_experiment(&self, batch_id: DbId, experiment_id: DbId) -> StoreResult<u64>;

    /// Transition a batch to `success` with a finish time, unless it
    /// already is. Returns 0 when nothing changed.
    async fn complete_batch(&self, batch_id: DbId, at: Timestamp) -> StoreResult<u64>;
}

// ---------------------------------------------------------------------------
// Blob store
// ---------------------------------------------------------------------------

/// A stored file with its content.
#[derive(Debug, Clone)]
pub struct Blob {
    pub descriptor: FileDescriptor,
    pub data: Vec<u8>,
}

/// Name-addressed binary object storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write a new blob under a freshly allocated identity.
    async fn create(&self, filename: &str, content_type: &str, data: &[u8]) -> StoreResult<FileDescriptor>;

    /// Write a blob under an existing identity.
    async fn overwrite(
        &self,
        id: DbId,
        filename: &str,
        content_type: &str,
        data: &[u8],
    ) -> StoreResult<FileDescriptor>;

    async fn read(&self, id: DbId) -> StoreResult<Option<Blob>>;

    /// Delete a blob. Unlinking a missing blob is not an error.
    async fn unlink(&self, id: DbId) -> StoreResult<()>;
}
