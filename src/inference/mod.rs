//! Segmentation over a staged study.
//!
//! Reads `staging/{study}/slice_N.png`, runs a `SegmentationModel` on each
//! slice and writes `results/{study}/slice_N_mask.png` plus
//! `results_seg/{study}/slice_N_seg.png`.

pub mod preprocess;

#[cfg(feature = "onnx")]
pub mod onnx;

use thiserror::Error;

use crate::gcp::{VertexClient, VertexError};
use crate::png;
use crate::storage::layout::{is_png, result_keys, study_prefix, GsUri, STAGING_PREFIX};
use crate::storage::{BlobStore, StorageError};

pub use preprocess::{apply_mask, prepare, threshold_mask, PreparedSlice, MASK_THRESHOLD};

#[cfg(feature = "onnx")]
pub use onnx::OnnxSegmenter;

/// File name of the exported network inside a registered artifact folder.
pub const MODEL_FILE: &str = "model.onnx";

/// Input resolution of the registered U-Net.
pub const MODEL_INPUT_SIZE: u32 = 256;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Model registry error: {0}")]
    Registry(#[from] VertexError),

    #[error("Model initialization failed: {0}")]
    ModelInit(String),

    #[error("Prediction failed: {0}")]
    Prediction(String),

    #[error("Prediction has {got} values, expected {expected}")]
    PredictionShape { expected: usize, got: usize },
}

/// A per-pixel segmentation network.
///
/// Input and output are row-major `height * width` planes (NHWC with N = C = 1).
pub trait SegmentationModel: Send + Sync {
    /// `(width, height)` the model expects.
    fn input_size(&self) -> (u32, u32);

    /// Per-pixel foreground probability for one normalized slice.
    fn predict(&self, input: &[f32]) -> Result<Vec<f32>, InferenceError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InferenceReport {
    pub processed: usize,
    /// Blank slices: zero mask written, model not called.
    pub skipped_blank: usize,
}

/// Segment every staged PNG of `study_id`, in listing order.
///
/// The first failing slice aborts the run.
pub fn run_study(
    store: &dyn BlobStore,
    study_id: &str,
    model: &dyn SegmentationModel,
) -> Result<InferenceReport, InferenceError> {
    let prefix = study_prefix(STAGING_PREFIX, study_id);
    let keys: Vec<String> = store.list_blobs(&prefix)?.into_iter().filter(|k| is_png(k)).collect();
    tracing::info!(study_id, slices = keys.len(), "Starting inference");

    let (width, height) = model.input_size();
    let mut report = InferenceReport::default();

    for key in &keys {
        let (mask_key, seg_key) = result_keys(key)?;
        let slice = prepare(&store.read_blob(key)?, width, height)?;

        let mask = if slice.is_blank() {
            report.skipped_blank += 1;
            vec![0u8; slice.pixels.len()]
        } else {
            let prediction = model.predict(&slice.input)?;
            if prediction.len() != slice.input.len() {
                return Err(InferenceError::PredictionShape {
                    expected: slice.input.len(),
                    got: prediction.len(),
                });
            }
            threshold_mask(&prediction)
        };
        let segmented = apply_mask(&slice.pixels, &mask);

        store.write_blob(&mask_key, &png::encode_gray(width, height, &mask)?, png::CONTENT_TYPE)?;
        store.write_blob(&seg_key, &png::encode_gray(width, height, &segmented)?, png::CONTENT_TYPE)?;

        report.processed += 1;
        tracing::info!(mask = %mask_key, segmented = %seg_key, "Slice segmented");
    }

    tracing::info!(
        study_id,
        processed = report.processed,
        skipped_blank = report.skipped_blank,
        "Inference finished"
    );
    Ok(report)
}

/// Resolve `model_resource_name` in the registry and download its network file.
///
/// `open_bucket` maps the artifact's bucket name to a store.
pub fn fetch_model_artifact<S>(
    vertex: &VertexClient,
    model_resource_name: &str,
    open_bucket: impl FnOnce(String) -> S,
) -> Result<Vec<u8>, InferenceError>
where
    S: BlobStore,
{
    let model = vertex.get_model(model_resource_name)?;
    tracing::info!(model = %model.name, artifact_uri = %model.artifact_uri, "Loading model from registry");

    let artifact = GsUri::parse(&model.artifact_uri)?;
    let key = artifact.join(MODEL_FILE);
    Ok(open_bucket(artifact.bucket).read_blob(&key)?)
}
