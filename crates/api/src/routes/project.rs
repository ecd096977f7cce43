//! Route definitions for the `/projects` resource.

use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::handlers::project;
use crate::state::AppState;

/// Routes mounted at `/projects`.
///
/// ```text
/// GET    /                                  -> list
/// POST   /                                  -> create
/// POST   /schema                            -> create_from_schema_file
/// GET    /{id}                              -> get_by_id
/// PUT    /{id}/category                     -> set_category
/// GET    /{id}/experiments                  -> list_experiments
/// DELETE /{id}/experiments                  -> delete_experiments
/// DELETE /{id}/experiments/files            -> delete_experiment_files
/// POST   /{id}/experiment                   -> submit_experiment
/// POST   /{id}/batch                        -> submit_batch
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(project::list).post(project::create))
        .route("/schema", post(project::create_from_schema_file))
        .route("/{id}", get(project::get_by_id))
        .route("/{id}/category", put(project::set_category))
        .route(
            "/{id}/experiments",
            get(project::list_experiments).delete(project::delete_experiments),
        )
        .route("/{id}/experiments/files", delete(project::delete_experiment_files))
        .route("/{id}/experiment", post(project::submit_experiment))
        .route("/{id}/batch", post(project::submit_batch))
}
