//! Register the U-Net artifact in Vertex AI Model Registry.
//!
//! Not idempotent: every run creates a new model.

use std::process::ExitCode;

use clap::Parser;

use brainslice::cli::RegisterArgs;
use brainslice::gcp::{self, VertexClient};
use brainslice::logging;

fn main() -> ExitCode {
    logging::init("model_registry");
    let args = RegisterArgs::parse();
    let request = args.upload_request();

    tracing::info!(
        display_name = %request.display_name,
        artifact_uri = %request.artifact_uri,
        "Registering model in Vertex AI Model Registry"
    );

    let result = gcp::provider_from_env()
        .map_err(|e| e.to_string())
        .and_then(|auth| {
            VertexClient::new(&args.project_id, &args.region, auth)
                .upload_model(&request)
                .map_err(|e| e.to_string())
        });

    match result {
        Ok(resource_name) => {
            tracing::info!(%resource_name, "Model registered");
            println!("{resource_name}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Model registration failed");
            ExitCode::FAILURE
        }
    }
}
