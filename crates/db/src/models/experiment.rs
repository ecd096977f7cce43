//! Experiment entity and DTOs.

use labcoord_core::attachments::FileDescriptor;
use labcoord_core::options::OptionMap;
use labcoord_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `experiments` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Experiment {
    pub id: DbId,
    pub project_id: DbId,
    pub machine_id: DbId,
    #[sqlx(json)]
    pub options: OptionMap,
    pub status: String,
    pub best_fitness_score: Option<f64>,
    pub scores: Option<serde_json::Value>,
    #[sqlx(json)]
    pub files: Vec<FileDescriptor>,
    pub notes: Option<String>,
    pub started_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

/// Status projection returned by `GET /experiments/{id}/status`.
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentStatus {
    pub id: DbId,
    pub status: String,
}

impl From<&Experiment> for ExperimentStatus {
    fn from(e: &Experiment) -> Self {
        Self {
            id: e.id,
            status: e.status.clone(),
        }
    }
}

/// Insert DTO used by the dispatcher once a worker has been chosen.
///
/// New experiments always start `running` with no files attached.
#[derive(Debug, Clone)]
pub struct NewExperiment {
    pub project_id: DbId,
    pub machine_id: DbId,
    pub options: OptionMap,
}

/// Patch reported by a worker via `PUT /experiments/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateExperiment {
    pub status: Option<String>,
    pub best_fitness_score: Option<f64>,
    pub scores: Option<serde_json::Value>,
    pub notes: Option<String>,
}

impl UpdateExperiment {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.best_fitness_score.is_none()
            && self.scores.is_none()
            && self.notes.is_none()
    }
}
