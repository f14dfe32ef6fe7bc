pub mod adhoc_scan;
pub mod data;
pub mod machines;
pub mod schedules;
pub mod state;
pub mod status;

pub use state::FwState;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

/// Catch-all for store and queue failures inside a handler.
pub(crate) fn internal_error(error: anyhow::Error) -> Response {
    error!("❌ Request failed: {error:#}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal server error" })),
    )
        .into_response()
}

pub(crate) fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

pub(crate) fn not_found(message: &str) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
}
