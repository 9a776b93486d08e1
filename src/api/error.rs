//! API error type rendered as `{ "status": "error", "message": ... }`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::ingest::IngestError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("{0}")]
    Ingest(#[from] IngestError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Ingest(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = ErrorBody {
            status: "error",
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
