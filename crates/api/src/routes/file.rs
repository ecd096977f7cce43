use axum::routing::get;
use axum::Router;

use crate::handlers::file;
use crate::state::AppState;

/// Routes mounted at `/files`.
pub fn router() -> Router<AppState> {
    Router::new().route("/{id}", get(file::download))
}
