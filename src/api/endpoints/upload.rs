//! `POST /upload`: multipart field `file` carrying a NIfTI volume.

use axum::extract::{Multipart, State};
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{AppState, UploadResponse};

pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut file_data = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {e}")))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Failed to read file data: {e}")))?;
            tracing::info!(%filename, size = bytes.len(), "Upload received");
            file_data = Some(bytes);
        }
    }

    let bytes = file_data.ok_or_else(|| ApiError::BadRequest("No file part".into()))?;

    let ingestor = state.ingestor.clone();
    let report = tokio::task::spawn_blocking(move || ingestor.ingest(&bytes))
        .await
        .map_err(|e| ApiError::Internal(format!("Ingestion task failed: {e}")))??;

    Ok(Json(UploadResponse::from(report)))
}
