use crate::inference::InferenceError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

/// Errors returned by API handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error("{0}")]
    Internal(String),
}

fn problem(status: StatusCode, title: &str, detail: String) -> Response {
    (
        status,
        Json(json!({
            "title": title,
            "detail": detail,
            "status": status.as_u16(),
        })),
    )
        .into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
            }
            ApiError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": msg }))).into_response()
            }
            ApiError::Inference(e) if e.is_timeout() => {
                problem(StatusCode::GATEWAY_TIMEOUT, "Inference timed out", e.to_string())
            }
            ApiError::Inference(e) => {
                error!("Inference error: {}", e);
                problem(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Inference failed",
                    e.to_string(),
                )
            }
            ApiError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": msg })),
                )
                    .into_response()
            }
        }
    }
}
