//! Batch entity.

use labcoord_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `batches` table.
///
/// `experiment_ids` only ever grows, one id per successfully dispatched
/// item, in completion order.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Batch {
    pub id: DbId,
    pub project_id: DbId,
    pub status: String,
    pub num_experiments: i32,
    pub experiment_ids: Vec<DbId>,
    pub started_at: Timestamp,
    pub finished_at: Option<Timestamp>,
}

/// Insert DTO for a new batch (status `running`, start time now).
#[derive(Debug, Clone)]
pub struct NewBatch {
    pub project_id: DbId,
    pub num_experiments: i32,
}
