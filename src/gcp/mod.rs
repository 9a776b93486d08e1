//! Google Cloud access over plain REST: OAuth2 access tokens and the
//! Vertex AI model registry. Cloud Storage lives in `storage::gcs`.

pub mod auth;
pub mod vertex;

pub use auth::{provider_from_env, AccessTokenProvider, AuthError};
pub use vertex::{Model, ModelUploadRequest, VertexClient, VertexError};

/// Serve `router` on an ephemeral localhost port and return its base URL.
#[cfg(test)]
pub(crate) async fn serve_mock(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{addr}")
}
