use axum::routing::get;
use axum::Router;

use crate::handlers::batch;
use crate::state::AppState;

/// Routes mounted at `/batches`.
pub fn router() -> Router<AppState> {
    Router::new().route("/{id}", get(batch::get_by_id))
}
