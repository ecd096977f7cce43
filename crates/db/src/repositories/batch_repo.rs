//! Repository for the `batches` table.

use labcoord_core::status::{BATCH_RUNNING, BATCH_SUCCESS};
use labcoord_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::batch::{Batch, NewBatch};

/// Column list for `batches` queries.
const COLUMNS: &str = "\
    id, project_id, status, num_experiments, experiment_ids, started_at, finished_at";

/// Provides CRUD operations for batches.
pub struct BatchRepo;

impl BatchRepo {
    pub async fn insert(pool: &PgPool, input: &NewBatch) -> Result<Batch, sqlx::Error> {
        let query = format!(
            "INSERT INTO batches (project_id, status, num_experiments, started_at) \
             VALUES ($1, $2, $3, NOW()) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Batch>(&query)
            .bind(input.project_id)
            .bind(BATCH_RUNNING)
            .bind(input.num_experiments)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Batch>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM batches WHERE id = $1");
        sqlx::query_as::<_, Batch>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Atomically append a dispatched experiment to the batch.
    pub async fn append_experiment(
        pool: &PgPool,
        batch_id: DbId,
        experiment_id: DbId,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE batches SET experiment_ids = array_append(experiment_ids, $2) WHERE id = $1",
        )
        .bind(batch_id)
        .bind(experiment_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Mark the batch successful unless it already is.
    pub async fn complete(pool: &PgPool, batch_id: DbId, at: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE batches SET status = $2, finished_at = $3 WHERE id = $1 AND status <> $2",
        )
        .bind(batch_id)
        .bind(BATCH_SUCCESS)
        .bind(at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
