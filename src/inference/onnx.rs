//! ONNX Runtime backend for `SegmentationModel`.

use std::sync::Mutex;

use ort::session::Session;
use ort::value::Tensor;

use super::{InferenceError, SegmentationModel};

/// U-Net exported to ONNX: `[1, H, W, 1]` f32 in, same shape out.
///
/// The session sits behind a Mutex because `Session::run` needs `&mut self`.
pub struct OnnxSegmenter {
    session: Mutex<Session>,
    width: u32,
    height: u32,
}

impl OnnxSegmenter {
    pub fn from_bytes(model: &[u8], width: u32, height: u32) -> Result<Self, InferenceError> {
        let session = Session::builder()
            .map_err(|e: ort::Error| InferenceError::ModelInit(e.to_string()))?
            .with_intra_threads(2)
            .map_err(|e: ort::Error| InferenceError::ModelInit(e.to_string()))?
            .commit_from_memory(model)
            .map_err(|e: ort::Error| InferenceError::ModelInit(format!("ONNX load failed: {e}")))?;

        tracing::info!(bytes = model.len(), width, height, "ONNX segmenter loaded");

        Ok(Self {
            session: Mutex::new(session),
            width,
            height,
        })
    }
}

impl SegmentationModel for OnnxSegmenter {
    fn input_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn predict(&self, input: &[f32]) -> Result<Vec<f32>, InferenceError> {
        let (w, h) = (self.width as usize, self.height as usize);
        let tensor = Tensor::from_array(([1usize, h, w, 1], input.to_vec()))
            .map_err(|e| InferenceError::Prediction(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| InferenceError::Prediction("Session lock poisoned".to_string()))?;

        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| InferenceError::Prediction(format!("ONNX inference failed: {e}")))?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::Prediction(format!("Output extraction: {e}")))?;

        // Either [1, H, W, 1] or [1, H, W]; anything that flattens to one plane.
        if data.len() != w * h {
            return Err(InferenceError::Prediction(format!(
                "Unexpected output shape: {shape:?}, expected [1, {h}, {w}, 1]"
            )));
        }
        Ok(data.to_vec())
    }
}
