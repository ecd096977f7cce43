//! Repository for the `projects` table.

use labcoord_core::types::DbId;
use sqlx::PgPool;

use crate::models::project::{CreateProject, Project};

/// Column list for `projects` queries.
const COLUMNS: &str = "id, name, schema, category, created_at";

/// Provides CRUD operations for projects.
pub struct ProjectRepo;

impl ProjectRepo {
    /// Insert a project. `schema_json` is the serialized schema; it is bound
    /// as text and cast to `JSON` so field order survives storage.
    pub async fn create(
        pool: &PgPool,
        input: &CreateProject,
        schema_json: &str,
    ) -> Result<Project, sqlx::Error> {
        let query = format!(
            "INSERT INTO projects (name, schema, category) \
             VALUES ($1, $2::JSON, COALESCE($3, '')) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Project>(&query)
            .bind(&input.name)
            .bind(schema_json)
            .bind(&input.category)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Project>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM projects WHERE id = $1");
        sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<Project>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM projects ORDER BY name");
        sqlx::query_as::<_, Project>(&query).fetch_all(pool).await
    }

    /// Category is the only mutable project field.
    pub async fn set_category(pool: &PgPool, id: DbId, category: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE projects SET category = $2 WHERE id = $1")
            .bind(id)
            .bind(category)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
