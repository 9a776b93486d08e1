//! Ingestion server lifecycle: bind → spawn background task → return a
//! handle with a shutdown channel.

use std::net::SocketAddr;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::api::router::ingestion_router;
use crate::api::types::AppState;

/// Handle to a running ingestion server.
pub struct IngestionServer {
    pub addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl IngestionServer {
    /// Ask the server to stop accepting connections. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("Ingestion server shutdown signal sent");
        }
    }

    /// Shut down and wait for in-flight requests to drain.
    pub async fn stop(mut self) {
        self.shutdown();
        if let Err(e) = self.task.await {
            tracing::error!("Ingestion server task failed: {e}");
        }
    }
}

/// Start the ingestion server on `addr` (port 0 picks an ephemeral port).
pub async fn start_ingestion_server_on(
    state: AppState,
    addr: SocketAddr,
) -> Result<IngestionServer, String> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind ingestion server on {addr}: {e}"))?;

    let addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get server address: {e}"))?;

    let app = ingestion_router(state);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
            tracing::info!("Ingestion server received shutdown signal");
        };

        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
        {
            tracing::error!("Ingestion server error: {e}");
        }

        tracing::info!("Ingestion server stopped");
    });

    tracing::info!(%addr, "Ingestion server started");

    Ok(IngestionServer {
        addr,
        shutdown_tx: Some(shutdown_tx),
        task,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Arc;

    use crate::ingest::Ingestor;
    use crate::storage::LocalStore;
    use crate::volume::SliceAxisPolicy;

    fn test_state(dir: &tempfile::TempDir) -> AppState {
        let store = Arc::new(LocalStore::create(&dir.path().join("local_storage")).unwrap());
        let ingestor = Ingestor::new(store, dir.path().join("tmp"), "", SliceAxisPolicy::Smallest);
        AppState::new(Arc::new(ingestor), 1024 * 1024)
    }

    fn localhost() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
    }

    #[tokio::test]
    async fn start_serve_and_stop() {
        let dir = tempfile::tempdir().unwrap();
        let server = start_ingestion_server_on(test_state(&dir), localhost())
            .await
            .expect("server should start");
        assert!(server.addr.port() > 0);

        let resp = reqwest::get(format!("http://{}/health", server.addr)).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        assert_eq!(resp.text().await.unwrap(), "OK");

        let resp = reqwest::get(format!("http://{}/nonexistent", server.addr)).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

        let addr = server.addr;
        server.stop().await;
        assert!(reqwest::get(format!("http://{addr}/health")).await.is_err());
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = start_ingestion_server_on(test_state(&dir), localhost())
            .await
            .expect("server should start");

        server.shutdown();
        server.shutdown();
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let first = start_ingestion_server_on(test_state(&dir), localhost()).await.unwrap();
        let err = start_ingestion_server_on(test_state(&dir), first.addr).await.err().unwrap();
        assert!(err.contains("Failed to bind"));
        first.stop().await;
    }
}
