//! Handlers for the `/projects` resource, including job and batch
//! submission.

use std::collections::HashMap;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use labcoord_core::error::CoreError;
use labcoord_core::options::{validate_schema, OptionMap, OptionSchema};
use labcoord_core::retry::parse_retry_window;
use labcoord_core::types::DbId;
use labcoord_db::models::batch::Batch;
use labcoord_db::models::experiment::Experiment;
use labcoord_db::models::project::{CreateProject, Project, UpdateCategory};

use crate::engine::attachments::unlink_logged;
use crate::engine::JobHandle;
use crate::error::{AppError, AppResult};
use crate::extract::{read_named_upload, JobSubmission, SCHEMA_FIELD};
use crate::query::RetryParams;
use crate::response::{DataResponse, DeletedCount};
use crate::state::AppState;

/// POST /api/v1/projects
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<CreateProject>,
) -> AppResult<(StatusCode, Json<DataResponse<Project>>)> {
    insert_project(&state, input).await
}

/// POST /api/v1/projects/schema
///
/// Build a project from an uploaded `.json` schema file. The project is
/// named after the file, without its extension.
pub async fn create_from_schema_file(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<Project>>)> {
    let upload = read_named_upload(multipart, SCHEMA_FIELD)
        .await?
        .ok_or_else(|| AppError::BadRequest("No schema file received".to_string()))?;
    let schema: OptionSchema = serde_json::from_slice(&upload.data).map_err(|e| {
        AppError::Core(CoreError::Validation(format!("Invalid schema file: {e}")))
    })?;
    let name = upload
        .filename
        .strip_suffix(".json")
        .unwrap_or(&upload.filename)
        .to_string();

    insert_project(
        &state,
        CreateProject {
            name,
            schema,
            category: None,
        },
    )
    .await
}

async fn insert_project(
    state: &AppState,
    input: CreateProject,
) -> AppResult<(StatusCode, Json<DataResponse<Project>>)> {
    if input.name.trim().is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "Project name must not be empty".to_string(),
        )));
    }
    validate_schema(&input.schema)?;

    let project = state.store.create_project(&input).await?;
    tracing::info!(project_id = project.id, name = %project.name, "Project created");
    Ok((StatusCode::CREATED, Json(DataResponse { data: project })))
}

/// GET /api/v1/projects
pub async fn list(State(state): State<AppState>) -> AppResult<Json<DataResponse<Vec<Project>>>> {
    let projects = state.store.list_projects().await?;
    Ok(Json(DataResponse { data: projects }))
}

/// GET /api/v1/projects/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Project>>> {
    let project = find_project(&state, id).await?;
    Ok(Json(DataResponse { data: project }))
}

/// PUT /api/v1/projects/{id}/category
pub async fn set_category(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateCategory>,
) -> AppResult<Json<DataResponse<Project>>> {
    if state.store.set_project_category(id, &input.category).await? == 0 {
        return Err(not_found(id));
    }
    let project = find_project(&state, id).await?;
    Ok(Json(DataResponse { data: project }))
}

/// GET /api/v1/projects/{id}/experiments
pub async fn list_experiments(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<Experiment>>>> {
    find_project(&state, id).await?;
    let experiments = state.store.list_project_experiments(id).await?;
    Ok(Json(DataResponse { data: experiments }))
}

/// DELETE /api/v1/projects/{id}/experiments
///
/// Remove every experiment of the project along with its files.
pub async fn delete_experiments(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<DeletedCount>>> {
    find_project(&state, id).await?;
    let removed = state.store.remove_project_experiments(id).await?;
    for experiment in &removed {
        for file in &experiment.files {
            unlink_logged(state.blobs.as_ref(), experiment.id, file.id).await;
        }
    }
    tracing::info!(project_id = id, count = removed.len(), "Project experiments deleted");
    Ok(Json(DataResponse {
        data: DeletedCount {
            deleted: removed.len(),
        },
    }))
}

/// DELETE /api/v1/projects/{id}/experiments/files
///
/// Unlink every file attached to the project's experiments. The
/// experiments themselves are kept with empty file lists.
pub async fn delete_experiment_files(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<DeletedCount>>> {
    find_project(&state, id).await?;
    let files = state.store.clear_project_files(id).await?;
    for file in &files {
        if let Err(e) = state.blobs.unlink(file.id).await {
            tracing::error!(project_id = id, file_id = file.id, error = %e, "Failed to unlink blob");
        }
    }
    tracing::info!(project_id = id, count = files.len(), "Project files deleted");
    Ok(Json(DataResponse {
        data: DeletedCount {
            deleted: files.len(),
        },
    }))
}

/// POST /api/v1/projects/{id}/experiment
///
/// Dispatch a single job. Query parameters are merged into the options,
/// with body values taking precedence.
pub async fn submit_experiment(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Query(query): Query<HashMap<String, String>>,
    mut submission: JobSubmission,
) -> AppResult<(StatusCode, Json<DataResponse<JobHandle>>)> {
    submission.merge_query(query);
    let handle = state
        .dispatcher
        .dispatch(id, submission.options, submission.files)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: handle })))
}

/// POST /api/v1/projects/{id}/batch?retry=<secs>
///
/// Returns as soon as the batch record exists; items are dispatched in the
/// background.
pub async fn submit_batch(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Query(params): Query<RetryParams>,
    Json(items): Json<Vec<OptionMap>>,
) -> AppResult<(StatusCode, Json<DataResponse<Batch>>)> {
    let window = parse_retry_window(params.retry.as_deref(), state.config.default_retry_window_secs);
    let batch = state.batches.submit_batch(id, items, window).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: batch })))
}

async fn find_project(state: &AppState, id: DbId) -> AppResult<Project> {
    state.store.find_project(id).await?.ok_or_else(|| not_found(id))
}

fn not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "Project",
        id,
    })
}
