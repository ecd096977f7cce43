//! Repository for the `machines` table.

use labcoord_core::types::DbId;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::machine::{Machine, MachineProjects, RegisterMachine};

/// Column list for `machines` queries.
const COLUMNS: &str = "id, address, hostname, projects, created_at";

/// Provides registration and lookup for worker machines.
pub struct MachineRepo;

impl MachineRepo {
    pub async fn register(pool: &PgPool, input: &RegisterMachine) -> Result<Machine, sqlx::Error> {
        let query = format!(
            "INSERT INTO machines (address, hostname, projects) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Machine>(&query)
            .bind(&input.address)
            .bind(&input.hostname)
            .bind(Json(&input.projects))
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Machine>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM machines WHERE id = $1");
        sqlx::query_as::<_, Machine>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All machines ordered by hostname (the capacity prober reads this).
    pub async fn list(pool: &PgPool) -> Result<Vec<Machine>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM machines ORDER BY hostname");
        sqlx::query_as::<_, Machine>(&query).fetch_all(pool).await
    }

    pub async fn set_projects(
        pool: &PgPool,
        id: DbId,
        projects: &MachineProjects,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE machines SET projects = $2 WHERE id = $1")
            .bind(id)
            .bind(Json(projects))
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn remove(pool: &PgPool, id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM machines WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
