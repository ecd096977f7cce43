use axum::routing::{get, post};
use axum::Router;

use crate::handlers::machine;
use crate::state::AppState;

/// Routes mounted at `/machines`.
///
/// ```text
/// GET    /                                  -> list
/// POST   /                                  -> register
/// GET    /{id}                              -> get_by_id
/// DELETE /{id}                              -> delete
/// POST   /{id}/projects                     -> set_projects
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(machine::list).post(machine::register))
        .route("/{id}", get(machine::get_by_id).delete(machine::delete))
        .route("/{id}/projects", post(machine::set_projects))
}
