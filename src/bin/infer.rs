//! Segment the staged slices of one study with a registered model.

use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use brainslice::cli::InferArgs;
use brainslice::gcp::{self, AccessTokenProvider, VertexClient};
use brainslice::inference::{self, InferenceReport, SegmentationModel};
use brainslice::logging;
use brainslice::storage::GcsStore;

fn main() -> ExitCode {
    logging::init("inference");
    let args = InferArgs::parse();

    match run(&args) {
        Ok(report) => {
            println!(
                "Processed {} slices of study {} ({} blank)",
                report.processed, args.study_id, report.skipped_blank
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(study_id = %args.study_id, error = %e, "Inference failed");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &InferArgs) -> Result<InferenceReport, Box<dyn Error>> {
    let auth = gcp::provider_from_env()?;
    let vertex = VertexClient::new(&args.project_id, &args.location, auth.clone());
    let model = load_model(&vertex, &args.model_resource_name, auth.clone())?;

    let store = GcsStore::new(args.bucket_images.clone(), auth);
    Ok(inference::run_study(&store, &args.study_id, model.as_ref())?)
}

#[cfg(feature = "onnx")]
fn load_model(
    vertex: &VertexClient,
    model_resource_name: &str,
    auth: Arc<dyn AccessTokenProvider>,
) -> Result<Box<dyn SegmentationModel>, Box<dyn Error>> {
    use inference::{OnnxSegmenter, MODEL_INPUT_SIZE};

    let bytes = inference::fetch_model_artifact(vertex, model_resource_name, |bucket| {
        GcsStore::new(bucket, auth)
    })?;
    Ok(Box::new(OnnxSegmenter::from_bytes(&bytes, MODEL_INPUT_SIZE, MODEL_INPUT_SIZE)?))
}

#[cfg(not(feature = "onnx"))]
fn load_model(
    _vertex: &VertexClient,
    _model_resource_name: &str,
    _auth: Arc<dyn AccessTokenProvider>,
) -> Result<Box<dyn SegmentationModel>, Box<dyn Error>> {
    Err("built without an inference backend; rebuild with `--features onnx`".into())
}
