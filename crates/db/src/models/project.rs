//! Project entity: an experiment template with its option schema.

use labcoord_core::options::OptionSchema;
use labcoord_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `projects` table.
///
/// Immutable after creation except for `category`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Project {
    pub id: DbId,
    pub name: String,
    #[sqlx(json)]
    pub schema: OptionSchema,
    pub category: String,
    pub created_at: Timestamp,
}

/// DTO for creating a project.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProject {
    pub name: String,
    pub schema: OptionSchema,
    pub category: Option<String>,
}

/// DTO for `PUT /projects/{id}/category`.
#[derive(Debug, Deserialize)]
pub struct UpdateCategory {
    pub category: String,
}
