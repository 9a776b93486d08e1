//! 8-bit grayscale PNG encoding shared by staging and result artifacts.

use image::codecs::png::PngEncoder;
use image::error::{ImageError, ParameterError, ParameterErrorKind};
use image::{ColorType, ImageEncoder};

pub const CONTENT_TYPE: &str = "image/png";

/// Encode a row-major `L8` buffer as PNG bytes.
pub fn encode_gray(width: u32, height: u32, pixels: &[u8]) -> image::ImageResult<Vec<u8>> {
    // The encoder panics on a length mismatch; report it instead.
    if (width as usize) * (height as usize) != pixels.len() {
        return Err(ImageError::Parameter(ParameterError::from_kind(
            ParameterErrorKind::DimensionMismatch,
        )));
    }
    let mut out = Vec::new();
    PngEncoder::new(&mut out).write_image(pixels, width, height, ColorType::L8)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_decoder() {
        let pixels: Vec<u8> = (0..12).map(|v| v * 20).collect();
        let png = encode_gray(4, 3, &pixels).unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_luma8();
        assert_eq!(decoded.dimensions(), (4, 3));
        assert_eq!(decoded.into_raw(), pixels);
    }

    #[test]
    fn buffer_size_mismatch_is_an_error() {
        assert!(encode_gray(4, 4, &[0u8; 3]).is_err());
    }
}
