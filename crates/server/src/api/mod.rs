pub mod handlers;
pub mod integrations;
pub mod jobs;
pub mod middleware;
pub mod routes;
pub mod supervisor;

pub use routes::create_router;

use axum::{http::StatusCode, Json};
use serde::Serialize;

/// Error body returned by every API handler.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Machine-readable reason, when the caller can act on it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            kind: None,
        }),
    )
}

pub(crate) fn api_error_kind(
    status: StatusCode,
    kind: &str,
    error: impl Into<String>,
) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            kind: Some(kind.to_string()),
        }),
    )
}

pub(crate) fn internal_error(e: impl std::fmt::Display) -> ApiError {
    api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
