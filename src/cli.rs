//! Command-line arguments of the `infer` and `register-model` binaries.

use std::collections::BTreeMap;

use clap::Parser;

use crate::gcp::ModelUploadRequest;

pub const MODEL_DISPLAY_NAME: &str = "unet-tumor-segmentation";
pub const MODEL_DESCRIPTION: &str =
    "U-Net model for brain segmentation (skull, eyes, nose, etc.) on NIfTI volumes (PNG slices).";
pub const SERVING_CONTAINER_IMAGE: &str = "us-docker.pkg.dev/vertex-ai/prediction/tf2-cpu.2-12:latest";
/// Artifact folder below the models bucket.
pub const MODEL_ARTIFACT_PATH: &str = "unet/v1/";

#[derive(Parser, Debug)]
#[command(name = "infer", version, about = "Segment the staged slices of one study")]
pub struct InferArgs {
    /// Google Cloud project
    #[arg(long = "project_id")]
    pub project_id: String,

    /// Vertex AI region, e.g. us-central1
    #[arg(long)]
    pub location: String,

    /// Bucket holding `staging/{study_id}/`
    #[arg(long = "bucket_images")]
    pub bucket_images: String,

    #[arg(long = "study_id")]
    pub study_id: String,

    /// Full resource name or bare model id
    #[arg(long = "model_resource_name")]
    pub model_resource_name: String,
}

#[derive(Parser, Debug)]
#[command(name = "register-model", version, about = "Register the U-Net artifact in Vertex AI Model Registry")]
pub struct RegisterArgs {
    #[arg(long = "project_id", env = "PROJECT_ID")]
    pub project_id: String,

    #[arg(long, env = "REGION")]
    pub region: String,

    /// Models bucket URI, e.g. gs://my-models
    #[arg(long = "bucket_models", env = "BUCKET_MODELS")]
    pub bucket_models: String,
}

impl RegisterArgs {
    pub fn artifact_uri(&self) -> String {
        format!("{}/{MODEL_ARTIFACT_PATH}", self.bucket_models.trim_end_matches('/'))
    }

    pub fn upload_request(&self) -> ModelUploadRequest {
        let labels: BTreeMap<String, String> = [("task", "segmentation"), ("architecture", "unet")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ModelUploadRequest {
            display_name: MODEL_DISPLAY_NAME.to_string(),
            description: MODEL_DESCRIPTION.to_string(),
            artifact_uri: self.artifact_uri(),
            serving_container_image_uri: SERVING_CONTAINER_IMAGE.to_string(),
            labels,
        }
    }
}
