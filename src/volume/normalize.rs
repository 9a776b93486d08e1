//! Per-slice min-max normalization to 8-bit grayscale.

use ndarray::ArrayView2;

/// Added to the intensity range before dividing.
pub const EPSILON: f64 = 1e-8;

/// A slice rescaled to `0..=255`, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedSlice {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    /// Slice had no usable intensity range and was emitted black.
    pub constant: bool,
}

impl NormalizedSlice {
    pub fn to_png(&self) -> image::ImageResult<Vec<u8>> {
        crate::png::encode_gray(self.width, self.height, &self.pixels)
    }
}

/// Rescale one slice. Rows of the image are the first axis of `view`.
///
/// Min and max are taken over finite voxels only; NaN/inf voxels become 0.
/// A slice whose finite values are all equal (or that has none) comes back
/// all zero with `constant` set.
pub fn normalize_slice(view: ArrayView2<'_, f32>) -> NormalizedSlice {
    let (rows, cols) = view.dim();

    let range = view
        .iter()
        .map(|&v| f64::from(v))
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<(f64, f64)>, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        });

    let (pixels, constant) = match range {
        Some((min, max)) if max > min => {
            let span = max - min + EPSILON;
            let pixels = view
                .iter()
                .map(|&v| {
                    let v = f64::from(v);
                    if v.is_finite() {
                        (((v - min) / span) * 255.0).round().clamp(0.0, 255.0) as u8
                    } else {
                        0
                    }
                })
                .collect();
            (pixels, false)
        }
        _ => (vec![0u8; rows * cols], true),
    };

    NormalizedSlice {
        width: cols as u32,
        height: rows as u32,
        pixels,
        constant,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, Array2};

    #[test]
    fn constant_slice_is_black() {
        let slice = Array2::from_elem((4, 6), 37.5f32);
        let out = normalize_slice(slice.view());
        assert!(out.constant);
        assert_eq!(out.width, 6);
        assert_eq!(out.height, 4);
        assert!(out.pixels.iter().all(|&p| p == 0));
    }

    #[test]
    fn zero_slice_is_black() {
        let out = normalize_slice(Array2::<f32>::zeros((3, 3)).view());
        assert!(out.constant);
        assert_eq!(out.pixels, vec![0; 9]);
    }

    #[test]
    fn range_spans_full_byte() {
        let slice = arr2(&[[-1000.0f32, 0.0], [500.0, 3000.0]]);
        let out = normalize_slice(slice.view());
        assert!(!out.constant);
        assert_eq!(out.pixels[0], 0);
        assert_eq!(out.pixels[3], 255);
        assert_eq!(*out.pixels.iter().min().unwrap(), 0);
        assert_eq!(*out.pixels.iter().max().unwrap(), 255);
    }

    #[test]
    fn interior_values_scale_linearly() {
        let slice = arr2(&[[0.0f32, 40.0, 100.0]]);
        let out = normalize_slice(slice.view());
        assert_eq!(out.pixels, vec![0, 102, 255]);
    }

    #[test]
    fn layout_is_row_major() {
        let slice = arr2(&[[0.0f32, 1.0, 2.0], [3.0, 4.0, 5.0]]);
        let out = normalize_slice(slice.view());
        assert_eq!((out.width, out.height), (3, 2));
        assert_eq!(out.pixels, vec![0, 51, 102, 153, 204, 255]);
    }

    #[test]
    fn transposed_view_keeps_logical_order() {
        let slice = arr2(&[[0.0f32, 3.0], [1.0, 4.0], [2.0, 5.0]]);
        let out = normalize_slice(slice.t());
        assert_eq!((out.width, out.height), (3, 2));
        assert_eq!(out.pixels, vec![0, 51, 102, 153, 204, 255]);
    }

    #[test]
    fn non_finite_voxels_are_ignored() {
        let slice = arr2(&[[f32::NAN, 10.0], [20.0, f32::INFINITY]]);
        let out = normalize_slice(slice.view());
        assert!(!out.constant);
        assert_eq!(out.pixels, vec![0, 0, 255, 0]);
    }

    #[test]
    fn all_nan_slice_is_constant() {
        let slice = Array2::from_elem((2, 2), f32::NAN);
        let out = normalize_slice(slice.view());
        assert!(out.constant);
        assert_eq!(out.pixels, vec![0; 4]);
    }

    #[test]
    fn encodes_as_png() {
        let out = normalize_slice(arr2(&[[0.0f32, 1.0], [2.0, 3.0]]).view());
        let png = out.to_png().unwrap();
        assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));
        let decoded = image::load_from_memory(&png).unwrap().to_luma8();
        assert_eq!(decoded.dimensions(), (2, 2));
        assert_eq!(decoded.into_raw(), out.pixels);
    }
}
