//! File download.

use axum::extract::{Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use labcoord_core::error::CoreError;
use labcoord_core::types::DbId;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// GET /api/v1/files/{id}
pub async fn download(State(state): State<AppState>, Path(id): Path<DbId>) -> AppResult<Response> {
    let blob = state
        .blobs
        .read(id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "File", id }))?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        blob.descriptor.filename.replace('"', "")
    );
    Ok((
        [
            (CONTENT_TYPE, blob.descriptor.mimetype),
            (CONTENT_DISPOSITION, disposition),
        ],
        blob.data,
    )
        .into_response())
}
