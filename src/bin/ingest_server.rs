//! NIfTI ingestion web service.

use std::error::Error;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use brainslice::api::{self, AppState};
use brainslice::config::Settings;
use brainslice::ingest::Ingestor;
use brainslice::{logging, storage};

fn main() -> Result<(), Box<dyn Error>> {
    logging::init("ingestion_service");

    let settings = Settings::from_env()?;
    // Built outside the runtime: the Cloud Storage client is blocking.
    let store = storage::from_settings(&settings)?;
    let ingestor = Arc::new(Ingestor::new(
        store,
        settings.upload_tmp_dir.clone(),
        settings.staging_prefix(),
        settings.slice_axis,
    ));
    tracing::info!(
        env = ?settings.app_env,
        backend = ?ingestor.backend(),
        port = settings.port,
        "Starting ingestion service"
    );

    let state = AppState::new(ingestor.clone(), settings.max_upload_bytes);
    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), settings.port);

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(async move {
        let server = api::start_ingestion_server_on(state, addr).await?;
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {e}");
        }
        server.stop().await;
        Ok::<(), String>(())
    })?;
    drop(runtime);

    // Last reference goes away here, outside any async context.
    drop(ingestor);
    Ok(())
}
