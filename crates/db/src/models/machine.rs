//! Machine (worker) entity.

use labcoord_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Project id -> worker-local configuration for that project.
pub type MachineProjects = serde_json::Map<String, serde_json::Value>;

/// A row from the `machines` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Machine {
    pub id: DbId,
    /// Base URL of the worker's HTTP API, e.g. `http://10.0.0.4:5081`.
    pub address: String,
    pub hostname: String,
    #[sqlx(json)]
    pub projects: MachineProjects,
    pub created_at: Timestamp,
}

/// DTO for registering a machine.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterMachine {
    pub address: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub projects: MachineProjects,
}

/// DTO for `POST /machines/{id}/projects`.
#[derive(Debug, Deserialize)]
pub struct UpdateMachineProjects {
    pub projects: MachineProjects,
}
