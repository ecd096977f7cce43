//! In-process record and blob stores.
//!
//! Each store keeps its tables behind a single `tokio::sync::RwLock`, so
//! every trait operation is atomic with respect to the others, matching the
//! per-record atomic update guarantee of the PostgreSQL backend.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use labcoord_core::attachments::{claim_by_name, FileDescriptor};
use labcoord_core::status::{BATCH_RUNNING, BATCH_SUCCESS, EXPERIMENT_RUNNING};
use labcoord_core::types::{DbId, Timestamp};
use tokio::sync::RwLock;

use crate::models::batch::{Batch, NewBatch};
use crate::models::experiment::{Experiment, NewExperiment, UpdateExperiment};
use crate::models::machine::{Machine, MachineProjects, RegisterMachine};
use crate::models::project::{CreateProject, Project};
use crate::store::{Blob, BlobStore, RecordStore, StoreResult};

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Tables {
    last_id: DbId,
    projects: BTreeMap<DbId, Project>,
    machines: BTreeMap<DbId, Machine>,
    experiments: BTreeMap<DbId, Experiment>,
    batches: BTreeMap<DbId, Batch>,
}

impl Tables {
    fn next_id(&mut self) -> DbId {
        self.last_id += 1;
        self.last_id
    }
}

/// Record store held entirely in memory.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of experiment records currently stored.
    pub async fn experiment_count(&self) -> usize {
        self.tables.read().await.experiments.len()
    }

    /// Number of batch records currently stored.
    pub async fn batch_count(&self) -> usize {
        self.tables.read().await.batches.len()
    }
}

/// Apply `f` to the record with `id`, returning the affected count.
fn touch<T>(table: &mut BTreeMap<DbId, T>, id: DbId, f: impl FnOnce(&mut T)) -> u64 {
    match table.get_mut(&id) {
        Some(record) => {
            f(record);
            1
        }
        None => 0,
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    // -- projects ----------------------------------------------------------

    async fn create_project(&self, input: &CreateProject) -> StoreResult<Project> {
        let mut t = self.tables.write().await;
        let project = Project {
            id: t.next_id(),
            name: input.name.clone(),
            schema: input.schema.clone(),
            category: input.category.clone().unwrap_or_default(),
            created_at: Utc::now(),
        };
        t.projects.insert(project.id, project.clone());
        Ok(project)
    }

    async fn find_project(&self, id: DbId) -> StoreResult<Option<Project>> {
        Ok(self.tables.read().await.projects.get(&id).cloned())
    }

    async fn list_projects(&self) -> StoreResult<Vec<Project>> {
        let mut projects: Vec<Project> = self.tables.read().await.projects.values().cloned().collect();
        projects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(projects)
    }

    async fn set_project_category(&self, id: DbId, category: &str) -> StoreResult<u64> {
        let mut t = self.tables.write().await;
        Ok(touch(&mut t.projects, id, |p| p.category = category.to_string()))
    }

    // -- machines ----------------------------------------------------------

    async fn register_machine(&self, input: &RegisterMachine) -> StoreResult<Machine> {
        let mut t = self.tables.write().await;
        let machine = Machine {
            id: t.next_id(),
            address: input.address.clone(),
            hostname: input.hostname.clone(),
            projects: input.projects.clone(),
            created_at: Utc::now(),
        };
        t.machines.insert(machine.id, machine.clone());
        Ok(machine)
    }

    async fn find_machine(&self, id: DbId) -> StoreResult<Option<Machine>> {
        Ok(self.tables.read().await.machines.get(&id).cloned())
    }

    async fn list_machines(&self) -> StoreResult<Vec<Machine>> {
        let mut machines: Vec<Machine> = self.tables.read().await.machines.values().cloned().collect();
        machines.sort_by(|a, b| a.hostname.cmp(&b.hostname));
        Ok(machines)
    }

    async fn set_machine_projects(&self, id: DbId, projects: &MachineProjects) -> StoreResult<u64> {
        let mut t = self.tables.write().await;
        Ok(touch(&mut t.machines, id, |m| m.projects = projects.clone()))
    }

    async fn remove_machine(&self, id: DbId) -> StoreResult<u64> {
        let mut t = self.tables.write().await;
        Ok(u64::from(t.machines.remove(&id).is_some()))
    }

    // -- experiments -------------------------------------------------------

    async fn insert_experiment(&self, input: &NewExperiment) -> StoreResult<Experiment> {
        let mut t = self.tables.write().await;
        let experiment = Experiment {
            id: t.next_id(),
            project_id: input.project_id,
            machine_id: input.machine_id,
            options: input.options.clone(),
            status: EXPERIMENT_RUNNING.to_string(),
            best_fitness_score: None,
            scores: None,
            files: Vec::new(),
            notes: None,
            started_at: None,
            finished_at: None,
            created_at: Utc::now(),
        };
        t.experiments.insert(experiment.id, experiment.clone());
        Ok(experiment)
    }

    async fn find_experiment(&self, id: DbId) -> StoreResult<Option<Experiment>> {
        Ok(self.tables.read().await.experiments.get(&id).cloned())
    }

    async fn find_experiments(&self, ids: &[DbId]) -> StoreResult<Vec<Experiment>> {
        let t = self.tables.read().await;
        Ok(t.experiments
            .values()
            .filter(|e| ids.contains(&e.id))
            .cloned()
            .collect())
    }

    async fn list_project_experiments(&self, project_id: DbId) -> StoreResult<Vec<Experiment>> {
        let t = self.tables.read().await;
        Ok(t.experiments
            .values()
            .filter(|e| e.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn update_experiment(&self, id: DbId, patch: &UpdateExperiment) -> StoreResult<u64> {
        let mut t = self.tables.write().await;
        Ok(touch(&mut t.experiments, id, |e| {
            if let Some(status) = &patch.status {
                e.status = status.clone();
            }
            if let Some(score) = patch.best_fitness_score {
                e.best_fitness_score = Some(score);
            }
            if let Some(scores) = &patch.scores {
                e.scores = Some(scores.clone());
            }
            if let Some(notes) = &patch.notes {
                e.notes = Some(notes.clone());
            }
        }))
    }

    async fn set_experiment_started(&self, id: DbId, at: Timestamp) -> StoreResult<u64> {
        let mut t = self.tables.write().await;
        Ok(touch(&mut t.experiments, id, |e| e.started_at = Some(at)))
    }

    async fn set_experiment_finished(&self, id: DbId, at: Timestamp) -> StoreResult<u64> {
        let mut t = self.tables.write().await;
        Ok(touch(&mut t.experiments, id, |e| e.finished_at = Some(at)))
    }

    async fn claim_experiment_file(
        &self,
        id: DbId,
        offered: &FileDescriptor,
    ) -> StoreResult<Option<FileDescriptor>> {
        let mut t = self.tables.write().await;
        Ok(t.experiments
            .get_mut(&id)
            .map(|e| claim_by_name(&mut e.files, offered)))
    }

    async fn detach_experiment_file(&self, id: DbId, file_id: DbId) -> StoreResult<u64> {
        let mut t = self.tables.write().await;
        Ok(touch(&mut t.experiments, id, |e| e.files.retain(|f| f.id != file_id)))
    }

    async fn clear_experiment_files(&self, id: DbId) -> StoreResult<Option<Vec<FileDescriptor>>> {
        let mut t = self.tables.write().await;
        Ok(t.experiments.get_mut(&id).map(|e| std::mem::take(&mut e.files)))
    }

    async fn clear_project_files(&self, project_id: DbId) -> StoreResult<Vec<FileDescriptor>> {
        let mut t = self.tables.write().await;
        Ok(t.experiments
            .values_mut()
            .filter(|e| e.project_id == project_id)
            .flat_map(|e| std::mem::take(&mut e.files))
            .collect())
    }

    async fn remove_experiment(&self, id: DbId) -> StoreResult<Option<Experiment>> {
        let mut t = self.tables.write().await;
        Ok(t.experiments.remove(&id))
    }

    async fn remove_project_experiments(&self, project_id: DbId) -> StoreResult<Vec<Experiment>> {
        let mut t = self.tables.write().await;
        let ids: Vec<DbId> = t
            .experiments
            .values()
            .filter(|e| e.project_id == project_id)
            .map(|e| e.id)
            .collect();
        Ok(ids.iter().filter_map(|id| t.experiments.remove(id)).collect())
    }

    // -- batches -----------------------------------------------------------

    async fn insert_batch(&self, input: &NewBatch) -> StoreResult<Batch> {
        let mut t = self.tables.write().await;
        let batch = Batch {
            id: t.next_id(),
            project_id: input.project_id,
            status: BATCH_RUNNING.to_string(),
            num_experiments: input.num_experiments,
            experiment_ids: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        };
        t.batches.insert(batch.id, batch.clone());
        Ok(batch)
    }

    async fn find_batch(&self, id: DbId) -> StoreResult<Option<Batch>> {
        Ok(self.tables.read().await.batches.get(&id).cloned())
    }

    async fn append_batch_experiment(&self, batch_id: DbId, experiment_id: DbId) -> StoreResult<u64> {
        let mut t = self.tables.write().await;
        Ok(touch(&mut t.batches, batch_id, |b| b.experiment_ids.push(experiment_id)))
    }

    async fn complete_batch(&self, batch_id: DbId, at: Timestamp) -> StoreResult<u64> {
        let mut t = self.tables.write().await;
        match t.batches.get_mut(&batch_id) {
            Some(b) if b.status != BATCH_SUCCESS => {
                b.status = BATCH_SUCCESS.to_string();
                b.finished_at = Some(at);
                Ok(1)
            }
            _ => Ok(0),
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryBlobStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Blobs {
    last_id: DbId,
    files: HashMap<DbId, Blob>,
}

/// Blob store held entirely in memory.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<Blobs>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs currently stored.
    pub async fn len(&self) -> usize {
        self.blobs.read().await.files.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn create(&self, filename: &str, content_type: &str, data: &[u8]) -> StoreResult<FileDescriptor> {
        let mut b = self.blobs.write().await;
        b.last_id += 1;
        let id = b.last_id;
        let descriptor = FileDescriptor {
            id,
            filename: filename.to_string(),
            mimetype: content_type.to_string(),
        };
        b.files.insert(
            id,
            Blob {
                descriptor: descriptor.clone(),
                data: data.to_vec(),
            },
        );
        Ok(descriptor)
    }

    async fn overwrite(
        &self,
        id: DbId,
        filename: &str,
        content_type: &str,
        data: &[u8],
    ) -> StoreResult<FileDescriptor> {
        let mut b = self.blobs.write().await;
        b.last_id = b.last_id.max(id);
        let descriptor = FileDescriptor {
            id,
            filename: filename.to_string(),
            mimetype: content_type.to_string(),
        };
        b.files.insert(
            id,
            Blob {
                descriptor: descriptor.clone(),
                data: data.to_vec(),
            },
        );
        Ok(descriptor)
    }

    async fn read(&self, id: DbId) -> StoreResult<Option<Blob>> {
        Ok(self.blobs.read().await.files.get(&id).cloned())
    }

    async fn unlink(&self, id: DbId) -> StoreResult<()> {
        self.blobs.write().await.files.remove(&id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
