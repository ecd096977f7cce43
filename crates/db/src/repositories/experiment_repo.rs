//! Repository for the `experiments` table.
//!
//! Every mutation is a single statement keyed by experiment or project id,
//! so concurrent callbacks and attachment writes on one experiment
//! serialize in the database rather than in the application.

use labcoord_core::attachments::FileDescriptor;
use labcoord_core::status::EXPERIMENT_RUNNING;
use labcoord_core::types::{DbId, Timestamp};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::experiment::{Experiment, NewExperiment, UpdateExperiment};

/// Column list for `experiments` queries.
const COLUMNS: &str = "\
    id, project_id, machine_id, options, status, best_fitness_score, scores, \
    files, notes, started_at, finished_at, created_at";

/// Provides CRUD operations for experiments.
pub struct ExperimentRepo;

impl ExperimentRepo {
    /// Insert a `running` experiment with an empty file list.
    pub async fn insert(pool: &PgPool, input: &NewExperiment) -> Result<Experiment, sqlx::Error> {
        let query = format!(
            "INSERT INTO experiments (project_id, machine_id, options, status) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Experiment>(&query)
            .bind(input.project_id)
            .bind(input.machine_id)
            .bind(Json(&input.options))
            .bind(EXPERIMENT_RUNNING)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Experiment>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM experiments WHERE id = $1");
        sqlx::query_as::<_, Experiment>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_ids(pool: &PgPool, ids: &[DbId]) -> Result<Vec<Experiment>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM experiments WHERE id = ANY($1) ORDER BY id");
        sqlx::query_as::<_, Experiment>(&query)
            .bind(ids)
            .fetch_all(pool)
            .await
    }

    pub async fn list_by_project(
        pool: &PgPool,
        project_id: DbId,
    ) -> Result<Vec<Experiment>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM experiments WHERE project_id = $1 ORDER BY id");
        sqlx::query_as::<_, Experiment>(&query)
            .bind(project_id)
            .fetch_all(pool)
            .await
    }

    /// Apply a worker-reported patch; `None` fields keep their value.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        patch: &UpdateExperiment,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE experiments SET \
                status = COALESCE($2, status), \
                best_fitness_score = COALESCE($3, best_fitness_score), \
                scores = COALESCE($4, scores), \
                notes = COALESCE($5, notes) \
             WHERE id = $1",
        )
        .bind(id)
        .bind(&patch.status)
        .bind(patch.best_fitness_score)
        .bind(&patch.scores)
        .bind(&patch.notes)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn set_started(pool: &PgPool, id: DbId, at: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE experiments SET started_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn set_finished(pool: &PgPool, id: DbId, at: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE experiments SET finished_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Attach `file` unless its filename is already attached; a match keeps
    /// its id and position and takes the new content type.
    ///
    /// The name test runs inside the `UPDATE`, so concurrent claims of one
    /// name serialize on the row lock and the later one sees the earlier
    /// attachment. Returns the attachment now carrying the name, or `None`
    /// when no experiment has this id.
    pub async fn claim_file(
        pool: &PgPool,
        id: DbId,
        file: &FileDescriptor,
    ) -> Result<Option<FileDescriptor>, sqlx::Error> {
        let claimed: Option<Option<Json<FileDescriptor>>> = sqlx::query_scalar(
            "UPDATE experiments SET files = CASE \
                WHEN EXISTS ( \
                    SELECT 1 FROM jsonb_array_elements(files) AS f WHERE f->>'filename' = $2) THEN ( \
                    SELECT jsonb_agg( \
                        CASE WHEN f->>'filename' = $2 \
                            THEN jsonb_set(f, '{mimetype}', to_jsonb($3::TEXT)) \
                            ELSE f END \
                        ORDER BY ord) \
                    FROM jsonb_array_elements(files) WITH ORDINALITY AS t(f, ord)) \
                ELSE files || jsonb_build_array($4::JSONB) \
             END \
             WHERE id = $1 \
             RETURNING ( \
                SELECT f FROM jsonb_array_elements(files) AS f \
                WHERE f->>'filename' = $2 LIMIT 1)",
        )
        .bind(id)
        .bind(&file.filename)
        .bind(&file.mimetype)
        .bind(Json(file))
        .fetch_optional(pool)
        .await?;
        Ok(claimed.flatten().map(|Json(f)| f))
    }

    pub async fn detach_file(pool: &PgPool, id: DbId, file_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE experiments SET files = COALESCE(( \
                SELECT jsonb_agg(f ORDER BY ord) \
                FROM jsonb_array_elements(files) WITH ORDINALITY AS t(f, ord) \
                WHERE (f->>'id')::BIGINT <> $2), '[]'::JSONB) \
             WHERE id = $1",
        )
        .bind(id)
        .bind(file_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Empty the file list, returning the list it held.
    pub async fn clear_files(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<Vec<FileDescriptor>>, sqlx::Error> {
        let cleared: Option<Json<Vec<FileDescriptor>>> = sqlx::query_scalar(
            "UPDATE experiments AS e SET files = '[]'::JSONB \
             FROM (SELECT id, files FROM experiments WHERE id = $1 FOR UPDATE) AS old \
             WHERE e.id = old.id \
             RETURNING old.files",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(cleared.map(|Json(files)| files))
    }

    /// Empty the file lists of a project's experiments, returning the
    /// descriptors removed.
    pub async fn clear_project_files(
        pool: &PgPool,
        project_id: DbId,
    ) -> Result<Vec<FileDescriptor>, sqlx::Error> {
        let cleared: Vec<Json<Vec<FileDescriptor>>> = sqlx::query_scalar(
            "UPDATE experiments AS e SET files = '[]'::JSONB \
             FROM (SELECT id, files FROM experiments WHERE project_id = $1 FOR UPDATE) AS old \
             WHERE e.id = old.id \
             RETURNING old.files",
        )
        .bind(project_id)
        .fetch_all(pool)
        .await?;
        Ok(cleared.into_iter().flat_map(|Json(files)| files).collect())
    }

    pub async fn remove(pool: &PgPool, id: DbId) -> Result<Option<Experiment>, sqlx::Error> {
        let query = format!("DELETE FROM experiments WHERE id = $1 RETURNING {COLUMNS}");
        sqlx::query_as::<_, Experiment>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn remove_by_project(
        pool: &PgPool,
        project_id: DbId,
    ) -> Result<Vec<Experiment>, sqlx::Error> {
        let query = format!("DELETE FROM experiments WHERE project_id = $1 RETURNING {COLUMNS}");
        sqlx::query_as::<_, Experiment>(&query)
            .bind(project_id)
            .fetch_all(pool)
            .await
    }
}
