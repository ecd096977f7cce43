//! Handlers for the `/batches` resource.

use axum::extract::{Path, State};
use axum::Json;
use labcoord_core::types::DbId;

use crate::engine::BatchView;
use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/batches/{id}
///
/// Progress is derived on every read; the read that first finds the batch
/// complete records its completion.
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<BatchView>>> {
    let view = state.batches.refresh(id).await?;
    Ok(Json(DataResponse { data: view }))
}
