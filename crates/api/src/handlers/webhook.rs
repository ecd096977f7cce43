//! Webhook registration.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use labcoord_core::lifecycle::WebhookRegistration;
use serde::Serialize;
use serde_json::Value;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Acknowledgement of a registered webhook.
#[derive(Debug, Serialize)]
pub struct Registered {
    pub status: &'static str,
    /// The registration exactly as submitted.
    pub options: Value,
}

/// POST /api/v1/webhooks
///
/// Registers a one-shot callback. When the named event fires, the
/// registration body is POSTed to its URL once.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> AppResult<(StatusCode, Json<DataResponse<Registered>>)> {
    // Fields of the wrong JSON type are reported like missing ones.
    let text = |key: &str| body.get(key).and_then(Value::as_str).map(str::to_string);
    let registration = WebhookRegistration {
        url: text("url"),
        objects: text("objects"),
        event: text("event"),
        object_id: body.get("object_id").cloned(),
    };
    let target = registration.resolve()?;

    state.webhooks.register(target, body.clone());
    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: Registered {
                status: "Registered",
                options: body,
            },
        }),
    ))
}
