//! Handlers for the `/experiments` resource: reads, worker status reports,
//! lifecycle callbacks and attachments.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use labcoord_core::error::CoreError;
use labcoord_core::lifecycle::{LifecycleEvent, ResourceKind, Topic};
use labcoord_core::types::{DbId, Timestamp};
use labcoord_db::models::experiment::{Experiment, ExperimentStatus, UpdateExperiment};
use labcoord_events::LifecycleNotice;
use serde::Serialize;

use crate::engine::attachments::{attach_files, unlink_logged};
use crate::error::{AppError, AppResult};
use crate::extract::read_uploads;
use crate::response::DataResponse;
use crate::state::AppState;

/// Result of a lifecycle callback.
#[derive(Debug, Serialize)]
pub struct LifecycleMark {
    pub id: DbId,
    pub event: &'static str,
    pub at: Timestamp,
    /// Webhooks fired by this callback.
    pub notified: usize,
}

/// GET /api/v1/experiments/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Experiment>>> {
    let experiment = find_experiment(&state, id).await?;
    Ok(Json(DataResponse { data: experiment }))
}

/// GET /api/v1/experiments/{id}/status
pub async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<ExperimentStatus>>> {
    let experiment = find_experiment(&state, id).await?;
    Ok(Json(DataResponse {
        data: ExperimentStatus::from(&experiment),
    }))
}

/// PUT /api/v1/experiments/{id}
///
/// Workers report status, best fitness score, scores and notes here.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(patch): Json<UpdateExperiment>,
) -> AppResult<Json<DataResponse<Experiment>>> {
    if patch.is_empty() {
        return Err(AppError::BadRequest("No fields to update".to_string()));
    }
    if state.store.update_experiment(id, &patch).await? == 0 {
        return Err(not_found(id));
    }
    tracing::debug!(experiment_id = id, status = ?patch.status, "Experiment updated");

    let experiment = find_experiment(&state, id).await?;
    Ok(Json(DataResponse { data: experiment }))
}

/// PUT /api/v1/experiments/{id}/started
pub async fn mark_started(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> AppResult<Json<DataResponse<LifecycleMark>>> {
    mark_lifecycle(&state, &raw_id, LifecycleEvent::Started).await
}

/// PUT /api/v1/experiments/{id}/finished
pub async fn mark_finished(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> AppResult<Json<DataResponse<LifecycleMark>>> {
    mark_lifecycle(&state, &raw_id, LifecycleEvent::Finished).await
}

/// Publish the lifecycle event, then record its timestamp.
///
/// The event is published for whatever id the worker reported, so
/// webhooks keyed on that id fire even if the record lookup then fails.
async fn mark_lifecycle(
    state: &AppState,
    raw_id: &str,
    event: LifecycleEvent,
) -> AppResult<Json<DataResponse<LifecycleMark>>> {
    let topic = Topic::lifecycle(ResourceKind::Experiments, raw_id, event);
    let at = Utc::now();
    let notified = state.event_bus.publish(
        LifecycleNotice::new(topic).with_payload(serde_json::json!({ "experiment_id": raw_id })),
    );

    let id: DbId = raw_id
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid experiment id: {raw_id}")))?;
    let affected = match event {
        LifecycleEvent::Started => state.store.set_experiment_started(id, at).await?,
        LifecycleEvent::Finished => state.store.set_experiment_finished(id, at).await?,
    };
    if affected == 0 {
        return Err(not_found(id));
    }

    tracing::info!(experiment_id = id, event = event.name(), notified, "Experiment lifecycle event");
    Ok(Json(DataResponse {
        data: LifecycleMark {
            id,
            event: event.name(),
            at,
            notified,
        },
    }))
}

/// PUT /api/v1/experiments/{id}/files
///
/// Upload files; names matching an existing attachment replace it in place.
pub async fn upload_files(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    multipart: Multipart,
) -> AppResult<Json<DataResponse<Experiment>>> {
    find_experiment(&state, id).await?;
    let uploads = read_uploads(multipart).await?;
    if uploads.is_empty() {
        return Err(AppError::BadRequest(
            "No files received in multipart upload".to_string(),
        ));
    }

    attach_files(state.store.as_ref(), state.blobs.as_ref(), id, uploads).await?;

    let experiment = find_experiment(&state, id).await?;
    Ok(Json(DataResponse { data: experiment }))
}

/// DELETE /api/v1/experiments/{id}/files
///
/// The file list is emptied first; blobs that then fail to unlink are
/// logged and left behind.
pub async fn delete_files(State(state): State<AppState>, Path(id): Path<DbId>) -> AppResult<StatusCode> {
    let files = state
        .store
        .clear_experiment_files(id)
        .await?
        .ok_or_else(|| not_found(id))?;
    for file in &files {
        unlink_logged(state.blobs.as_ref(), id, file.id).await;
    }
    tracing::debug!(experiment_id = id, count = files.len(), "Experiment files deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/experiments/{id}
pub async fn delete(State(state): State<AppState>, Path(id): Path<DbId>) -> AppResult<StatusCode> {
    let experiment = state
        .store
        .remove_experiment(id)
        .await?
        .ok_or_else(|| not_found(id))?;
    for file in &experiment.files {
        unlink_logged(state.blobs.as_ref(), id, file.id).await;
    }
    tracing::info!(experiment_id = id, "Experiment deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn find_experiment(state: &AppState, id: DbId) -> AppResult<Experiment> {
    state.store.find_experiment(id).await?.ok_or_else(|| not_found(id))
}

fn not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "Experiment",
        id,
    })
}
