//! Slice preprocessing and mask post-processing around the model call.

use image::imageops::{self, FilterType};

/// Prediction probability above which a pixel belongs to the mask.
pub const MASK_THRESHOLD: f32 = 0.5;

/// A staged slice resized to the model's input resolution.
#[derive(Debug, Clone)]
pub struct PreparedSlice {
    pub width: u32,
    pub height: u32,
    /// Resized 8-bit grayscale, row-major.
    pub pixels: Vec<u8>,
    /// `pixels / 255`, the model input.
    pub input: Vec<f32>,
}

impl PreparedSlice {
    /// No signal at all; the model is skipped for such slices.
    pub fn is_blank(&self) -> bool {
        self.pixels.iter().all(|&p| p == 0)
    }
}

/// Decode a PNG (any color type), convert to grayscale and resize.
pub fn prepare(png: &[u8], width: u32, height: u32) -> image::ImageResult<PreparedSlice> {
    let gray = image::load_from_memory(png)?.to_luma8();
    let resized = if gray.dimensions() == (width, height) {
        gray
    } else {
        imageops::resize(&gray, width, height, FilterType::CatmullRom)
    };

    let pixels = resized.into_raw();
    let input = pixels.iter().map(|&p| f32::from(p) / 255.0).collect();
    Ok(PreparedSlice {
        width,
        height,
        pixels,
        input,
    })
}

/// 255 where `prediction > MASK_THRESHOLD`, else 0.
pub fn threshold_mask(prediction: &[f32]) -> Vec<u8> {
    prediction
        .iter()
        .map(|&p| if p > MASK_THRESHOLD { 255 } else { 0 })
        .collect()
}

/// Keep input pixels under the mask, zero elsewhere.
pub fn apply_mask(pixels: &[u8], mask: &[u8]) -> Vec<u8> {
    pixels
        .iter()
        .zip(mask)
        .map(|(&p, &m)| if m > 0 { p } else { 0 })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::png::encode_gray;

    #[test]
    fn resizes_to_model_input() {
        let png = encode_gray(10, 6, &[128u8; 60]).unwrap();
        let slice = prepare(&png, 256, 256).unwrap();
        assert_eq!(slice.pixels.len(), 256 * 256);
        assert_eq!(slice.input.len(), 256 * 256);
        assert!(slice.pixels.iter().all(|&p| p.abs_diff(128) <= 1));
        assert!((slice.input[0] - f32::from(slice.pixels[0]) / 255.0).abs() < 1e-6);
        assert!(!slice.is_blank());
    }

    #[test]
    fn black_slice_is_blank() {
        let png = encode_gray(4, 4, &[0u8; 16]).unwrap();
        let slice = prepare(&png, 8, 8).unwrap();
        assert!(slice.is_blank());
        assert!(slice.input.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn same_size_input_is_untouched() {
        let pixels: Vec<u8> = (0..16).map(|v| v * 16).collect();
        let png = encode_gray(4, 4, &pixels).unwrap();
        let slice = prepare(&png, 4, 4).unwrap();
        assert_eq!(slice.pixels, pixels);
        assert_eq!(slice.input[15], 240.0 / 255.0);
    }

    #[test]
    fn threshold_is_strict() {
        assert_eq!(threshold_mask(&[0.0, 0.5, 0.51, 1.0]), vec![0, 0, 255, 255]);
    }

    #[test]
    fn mask_selects_input_pixels() {
        assert_eq!(apply_mask(&[10, 20, 30, 40], &[255, 0, 255, 0]), vec![10, 0, 30, 0]);
    }

    #[test]
    fn garbage_png_is_an_error() {
        assert!(prepare(b"not a png", 4, 4).is_err());
    }
}
