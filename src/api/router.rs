//! Ingestion router.
//!
//! ```text
//! GET  /        upload form
//! GET  /health  "OK"
//! POST /upload  multipart `file` → slices
//! ```

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::types::AppState;

pub fn ingestion_router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;
    Router::new()
        .route("/", get(endpoints::page::upload_form))
        .route("/health", get(endpoints::health::check))
        .route("/upload", post(endpoints::upload::upload))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use ndarray::Array3;
    use tower::ServiceExt;

    use crate::ingest::Ingestor;
    use crate::storage::{BlobStore, LocalStore};
    use crate::volume::SliceAxisPolicy;

    const BOUNDARY: &str = "brainslice-test-boundary";

    struct TestApp {
        dir: tempfile::TempDir,
        store: Arc<LocalStore>,
        state: AppState,
    }

    fn test_app(max_upload_bytes: usize) -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalStore::create(&dir.path().join("local_storage")).unwrap());
        let ingestor = Ingestor::new(
            store.clone(),
            dir.path().join("tmp"),
            "",
            SliceAxisPolicy::Smallest,
        );
        let state = AppState::new(Arc::new(ingestor), max_upload_bytes);
        TestApp { dir, store, state }
    }

    fn multipart_request(field: &str, payload: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{field}\"; filename=\"scan.nii\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(payload);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/upload")
            .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    fn nifti_bytes(shape: (usize, usize, usize)) -> Vec<u8> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.nii");
        let volume = Array3::from_shape_fn(shape, |(i, j, k)| (i + j * 2 + k * 3) as f32);
        nifti::writer::WriterOptions::new(&path).write_nifti(&volume).unwrap();
        std::fs::read(path).unwrap()
    }

    async fn json_of(response: axum::response::Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let app = ingestion_router(test_app(1024).state);
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), 64).await.unwrap();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn index_serves_upload_form() {
        let app = ingestion_router(test_app(1024).state);
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("enctype=\"multipart/form-data\""));
        assert!(html.contains("name=\"file\""));
    }

    #[tokio::test]
    async fn upload_stages_slices_locally() {
        let t = test_app(16 * 1024 * 1024);
        let app = ingestion_router(t.state.clone());

        let response = app
            .oneshot(multipart_request("file", &nifti_bytes((10, 10, 5))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_of(response).await;
        assert_eq!(json["status"], "Local Save Success");
        assert_eq!(json["slices"], 5);
        let id = json["id"].as_str().unwrap();
        assert!(json["folder_path"].as_str().unwrap().ends_with(id));
        assert_eq!(t.store.list_blobs(&format!("{id}/")).unwrap().len(), 5);
        assert!(std::fs::read_dir(t.dir.path().join("tmp")).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn missing_file_field_is_400() {
        let app = ingestion_router(test_app(1024 * 1024).state);
        let response = app.oneshot(multipart_request("document", b"data")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_of(response).await["status"], "error");
    }

    #[tokio::test]
    async fn invalid_volume_is_500_and_cleaned_up() {
        let t = test_app(1024 * 1024);
        let app = ingestion_router(t.state.clone());
        let response = app
            .oneshot(multipart_request("file", b"this is not a nifti volume"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = json_of(response).await;
        assert_eq!(json["status"], "error");
        assert!(!json["message"].as_str().unwrap().is_empty());
        assert!(std::fs::read_dir(t.dir.path().join("tmp")).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let app = ingestion_router(test_app(512).state);
        let response = app
            .oneshot(multipart_request("file", &vec![0u8; 4096]))
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }
}
