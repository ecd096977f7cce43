use axum::routing::post;
use axum::Router;

use crate::handlers::webhook;
use crate::state::AppState;

/// Routes mounted at `/webhooks`.
///
/// ```text
/// POST   /                                  -> register
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/", post(webhook::register))
}
