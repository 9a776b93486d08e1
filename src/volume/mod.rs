//! 3D NIfTI volumes: loading, canonical (RAS+) reorientation and slicing.
//!
//! Voxel data is kept as `Array3<f32>` in NIfTI axis order `[i, j, k]`.
//! Orientation is the 3x3 linear part of the voxel-to-world affine,
//! `m[world][voxel]`; translation does not affect axis order so it is not kept.

pub mod normalize;

use std::path::Path;

use ndarray::{Array3, ArrayD, ArrayView2, Axis, Ix3};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};
use thiserror::Error;

pub use normalize::{normalize_slice, NormalizedSlice, EPSILON};

/// Voxel-to-world linear map, indexed `[world_axis][voxel_axis]`.
pub type Orientation = [[f64; 3]; 3];

#[derive(Error, Debug)]
pub enum VolumeError {
    #[error("NIfTI read failed: {0}")]
    Nifti(#[from] nifti::NiftiError),

    #[error("Expected a 3D volume, got shape {0:?}")]
    UnsupportedShape(Vec<usize>),

    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("Orientation matrix is degenerate: {0:?}")]
    DegenerateOrientation(Orientation),
}

/// Which axis of the canonical volume slices are taken along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceAxisPolicy {
    /// Thinnest dimension. Matches typical acquisitions but is a heuristic.
    Smallest,
    /// Always the given canonical axis (0 = R, 1 = A, 2 = S).
    Fixed(usize),
}

impl SliceAxisPolicy {
    /// Parse `smallest`, `0`, `1` or `2`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("smallest") {
            return Some(Self::Smallest);
        }
        match raw.parse::<usize>() {
            Ok(axis) if axis < 3 => Some(Self::Fixed(axis)),
            _ => None,
        }
    }

    /// Pick the slice axis for a volume of `shape`. Ties go to the lowest axis.
    pub fn select(&self, shape: [usize; 3]) -> usize {
        match *self {
            Self::Fixed(axis) => axis,
            Self::Smallest => shape
                .iter()
                .enumerate()
                .min_by_key(|&(axis, &extent)| (extent, axis))
                .map(|(axis, _)| axis)
                .unwrap_or(0),
        }
    }
}

/// A decoded 3D volume with its orientation.
#[derive(Debug, Clone)]
pub struct Volume {
    data: Array3<f32>,
    orientation: Orientation,
}

impl Volume {
    pub fn new(data: Array3<f32>, orientation: Orientation) -> Self {
        Self { data, orientation }
    }

    /// Read a `.nii` or `.nii.gz` file (the reader decides by extension).
    ///
    /// A 4D volume is accepted only when its fourth dimension is 1.
    pub fn open(path: &Path) -> Result<Self, VolumeError> {
        let obj = ReaderOptions::new().read_file(path)?;
        let orientation = orientation_from_header(obj.header());
        let data: ArrayD<f32> = obj.into_volume().into_ndarray()?;
        Ok(Self {
            data: into_3d(data)?,
            orientation,
        })
    }

    pub fn shape(&self) -> [usize; 3] {
        let (i, j, k) = self.data.dim();
        [i, j, k]
    }

    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    pub fn orientation(&self) -> &Orientation {
        &self.orientation
    }

    /// Reorient to RAS+: axis 0 runs left→right, 1 posterior→anterior,
    /// 2 inferior→superior, whatever the storage order of the source.
    pub fn canonical(self) -> Result<Self, VolumeError> {
        let codes = axis_codes(&self.orientation)?;

        let mut data = self
            .data
            .permuted_axes([codes[0].0, codes[1].0, codes[2].0]);
        for (axis, &(_, flipped)) in codes.iter().enumerate() {
            if flipped {
                data.invert_axis(Axis(axis));
            }
        }

        let mut orientation = [[0.0; 3]; 3];
        for (world, &(voxel, _)) in codes.iter().enumerate() {
            orientation[world][world] = column_norm(&self.orientation, voxel);
        }

        Ok(Self {
            data: data.as_standard_layout().into_owned(),
            orientation,
        })
    }

    /// 2D cross-sections along `axis`, in index order.
    pub fn slices(&self, axis: usize) -> impl ExactSizeIterator<Item = ArrayView2<'_, f32>> {
        self.data.axis_iter(Axis(axis))
    }
}

fn into_3d(data: ArrayD<f32>) -> Result<Array3<f32>, VolumeError> {
    let shape = data.shape().to_vec();
    match shape.as_slice() {
        [_, _, _] => Ok(data.into_dimensionality::<Ix3>()?),
        [_, _, _, 1] => Ok(data.index_axis_move(Axis(3), 0).into_dimensionality::<Ix3>()?),
        _ => Err(VolumeError::UnsupportedShape(shape)),
    }
}

/// Linear part of the voxel-to-world affine, preferring sform over qform.
/// Without either, voxel axes are taken as already RAS, scaled by pixdim.
pub fn orientation_from_header(header: &NiftiHeader) -> Orientation {
    let spacing = |i: usize| {
        let v = f64::from(header.pixdim[i]).abs();
        if v > 0.0 && v.is_finite() {
            v
        } else {
            1.0
        }
    };

    if header.sform_code > 0 {
        let rows = [header.srow_x, header.srow_y, header.srow_z];
        let mut m = [[0.0; 3]; 3];
        for (world, row) in rows.iter().enumerate() {
            for voxel in 0..3 {
                m[world][voxel] = f64::from(row[voxel]);
            }
        }
        return m;
    }

    if header.qform_code > 0 {
        let qfac = if header.pixdim[0] < 0.0 { -1.0 } else { 1.0 };
        let rotation = quaternion_rotation(
            f64::from(header.quatern_b),
            f64::from(header.quatern_c),
            f64::from(header.quatern_d),
        );
        let scale = [spacing(1), spacing(2), spacing(3) * qfac];
        let mut m = [[0.0; 3]; 3];
        for world in 0..3 {
            for voxel in 0..3 {
                m[world][voxel] = rotation[world][voxel] * scale[voxel];
            }
        }
        return m;
    }

    [
        [spacing(1), 0.0, 0.0],
        [0.0, spacing(2), 0.0],
        [0.0, 0.0, spacing(3)],
    ]
}

/// Rotation matrix of the unit quaternion `(a, b, c, d)` with `a` derived.
fn quaternion_rotation(b: f64, c: f64, d: f64) -> [[f64; 3]; 3] {
    let a = (1.0 - (b * b + c * c + d * d)).max(0.0).sqrt();
    [
        [
            a * a + b * b - c * c - d * d,
            2.0 * (b * c - a * d),
            2.0 * (b * d + a * c),
        ],
        [
            2.0 * (b * c + a * d),
            a * a + c * c - b * b - d * d,
            2.0 * (c * d - a * b),
        ],
        [
            2.0 * (b * d - a * c),
            2.0 * (c * d + a * b),
            a * a + d * d - c * c - b * b,
        ],
    ]
}

/// For each world axis (R, A, S): the voxel axis mapped onto it and whether
/// it runs in the negative direction.
///
/// Assignment is greedy on the largest absolute matrix entry, so an oblique
/// acquisition lands on its closest canonical orientation.
pub fn axis_codes(m: &Orientation) -> Result<[(usize, bool); 3], VolumeError> {
    let mut entries: Vec<(f64, usize, usize)> = (0..3)
        .flat_map(|world| (0..3).map(move |voxel| (world, voxel)))
        .map(|(world, voxel)| (m[world][voxel].abs(), world, voxel))
        .filter(|(magnitude, _, _)| magnitude.is_finite() && *magnitude > 0.0)
        .collect();
    entries.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut world_taken = [false; 3];
    let mut voxel_taken = [false; 3];
    let mut codes: [Option<(usize, bool)>; 3] = [None; 3];
    for (_, world, voxel) in entries {
        if world_taken[world] || voxel_taken[voxel] {
            continue;
        }
        world_taken[world] = true;
        voxel_taken[voxel] = true;
        codes[world] = Some((voxel, m[world][voxel] < 0.0));
    }

    match codes {
        [Some(r), Some(a), Some(s)] => Ok([r, a, s]),
        _ => Err(VolumeError::DegenerateOrientation(*m)),
    }
}

fn column_norm(m: &Orientation, voxel: usize) -> f64 {
    (0..3).map(|world| m[world][voxel].powi(2)).sum::<f64>().sqrt()
}
