//! Shared handler state and response bodies.

use std::sync::Arc;

use serde::Serialize;

use crate::ingest::{IngestReport, Ingestor};
use crate::storage::BackendKind;

/// State handed to every handler via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub ingestor: Arc<Ingestor>,
    /// Request body limit in bytes, multipart overhead included.
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(ingestor: Arc<Ingestor>, max_upload_bytes: usize) -> Self {
        Self {
            ingestor,
            max_upload_bytes,
        }
    }
}

/// Body of a successful `POST /upload`.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub status: &'static str,
    pub id: String,
    pub folder_path: String,
    pub slices: usize,
}

impl From<IngestReport> for UploadResponse {
    fn from(report: IngestReport) -> Self {
        let status = match report.backend {
            BackendKind::Local => "Local Save Success",
            BackendKind::Cloud => "Cloud Upload Success",
        };
        Self {
            status,
            id: report.study_id.to_string(),
            folder_path: report.folder_uri,
            slices: report.slices,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn report(backend: BackendKind) -> IngestReport {
        IngestReport {
            study_id: Uuid::nil(),
            folder_uri: "gs://scans/staging/00000000-0000-0000-0000-000000000000/".into(),
            slices: 3,
            backend,
        }
    }

    #[test]
    fn status_names_the_backend() {
        assert_eq!(UploadResponse::from(report(BackendKind::Local)).status, "Local Save Success");
        assert_eq!(UploadResponse::from(report(BackendKind::Cloud)).status, "Cloud Upload Success");
    }

    #[test]
    fn serializes_flat() {
        let json = serde_json::to_value(UploadResponse::from(report(BackendKind::Cloud))).unwrap();
        assert_eq!(json["id"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(json["slices"], 3);
        assert!(json["folder_path"].as_str().unwrap().starts_with("gs://"));
    }
}
