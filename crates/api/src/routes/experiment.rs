//! Route definitions for the `/experiments` resource.

use axum::routing::{get, put};
use axum::Router;

use crate::handlers::experiment;
use crate::state::AppState;

/// Routes mounted at `/experiments`.
///
/// ```text
/// GET    /{id}                              -> get_by_id
/// PUT    /{id}                              -> update
/// DELETE /{id}                              -> delete
/// GET    /{id}/status                       -> get_status
/// PUT    /{id}/started                      -> mark_started
/// PUT    /{id}/finished                     -> mark_finished
/// PUT    /{id}/files                        -> upload_files
/// DELETE /{id}/files                        -> delete_files
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/{id}",
            get(experiment::get_by_id)
                .put(experiment::update)
                .delete(experiment::delete),
        )
        .route("/{id}/status", get(experiment::get_status))
        .route("/{id}/started", put(experiment::mark_started))
        .route("/{id}/finished", put(experiment::mark_finished))
        .route(
            "/{id}/files",
            put(experiment::upload_files).delete(experiment::delete_files),
        )
}
