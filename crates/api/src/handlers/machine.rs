//! Handlers for the `/machines` resource (worker registration).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use labcoord_core::error::CoreError;
use labcoord_core::types::DbId;
use labcoord_db::models::machine::{Machine, RegisterMachine, UpdateMachineProjects};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/machines
pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterMachine>,
) -> AppResult<(StatusCode, Json<DataResponse<Machine>>)> {
    let address = input.address.trim();
    if !(address.starts_with("http://") || address.starts_with("https://")) {
        return Err(AppError::Core(CoreError::Validation(
            "Machine address must be an http(s) URL".to_string(),
        )));
    }

    let machine = state.store.register_machine(&input).await?;
    tracing::info!(machine_id = machine.id, address = %machine.address, "Machine registered");
    Ok((StatusCode::CREATED, Json(DataResponse { data: machine })))
}

/// GET /api/v1/machines
pub async fn list(State(state): State<AppState>) -> AppResult<Json<DataResponse<Vec<Machine>>>> {
    let machines = state.store.list_machines().await?;
    Ok(Json(DataResponse { data: machines }))
}

/// GET /api/v1/machines/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Machine>>> {
    let machine = state
        .store
        .find_machine(id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Machine",
            id,
        }))?;
    Ok(Json(DataResponse { data: machine }))
}

/// POST /api/v1/machines/{id}/projects
///
/// Replace the machine's project map.
pub async fn set_projects(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateMachineProjects>,
) -> AppResult<Json<DataResponse<Machine>>> {
    if state.store.set_machine_projects(id, &input.projects).await? == 0 {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Machine",
            id,
        }));
    }
    get_by_id(State(state), Path(id)).await
}

/// DELETE /api/v1/machines/{id}
///
/// Deregister a worker so the prober stops querying it.
pub async fn delete(State(state): State<AppState>, Path(id): Path<DbId>) -> AppResult<StatusCode> {
    if state.store.remove_machine(id).await? == 0 {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Machine",
            id,
        }));
    }
    tracing::info!(machine_id = id, "Machine deregistered");
    Ok(StatusCode::NO_CONTENT)
}
