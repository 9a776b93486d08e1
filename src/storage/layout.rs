//! Object key layout shared by ingestion and inference.
//!
//! ```text
//! staging/{study_id}/slice_{n}.png          ingestion output, inference input
//! results/{study_id}/slice_{n}_mask.png     binary mask
//! results_seg/{study_id}/slice_{n}_seg.png  input masked by prediction
//! ```
//! The local backend drops the `staging/` part: `local_storage/{study_id}/slice_{n}.png`.

use super::StorageError;

pub const STAGING_PREFIX: &str = "staging/";
pub const RESULTS_PREFIX: &str = "results/";
pub const RESULTS_SEG_PREFIX: &str = "results_seg/";

/// Folder of one study under `staging_prefix`, with a trailing slash.
pub fn study_prefix(staging_prefix: &str, study_id: &str) -> String {
    format!("{staging_prefix}{study_id}/")
}

/// Key of slice `index` (1-based) of a study.
pub fn staging_key(staging_prefix: &str, study_id: &str, index: usize) -> String {
    format!("{}slice_{index}.png", study_prefix(staging_prefix, study_id))
}

pub fn is_png(key: &str) -> bool {
    key.to_ascii_lowercase().ends_with(".png")
}

/// Mask and segmented-image keys for a staged slice, keeping its stem.
pub fn result_keys(staged_key: &str) -> Result<(String, String), StorageError> {
    let rest = staged_key
        .strip_prefix(STAGING_PREFIX)
        .filter(|rest| is_png(rest))
        .ok_or_else(|| StorageError::InvalidKey(staged_key.to_string()))?;
    let stem = &rest[..rest.len() - ".png".len()];
    Ok((
        format!("{RESULTS_PREFIX}{stem}_mask.png"),
        format!("{RESULTS_SEG_PREFIX}{stem}_seg.png"),
    ))
}

/// A `gs://bucket/path` location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GsUri {
    pub bucket: String,
    pub path: String,
}

impl GsUri {
    pub fn parse(uri: &str) -> Result<Self, StorageError> {
        let rest = uri
            .strip_prefix("gs://")
            .ok_or_else(|| StorageError::InvalidUri(uri.to_string()))?;
        let (bucket, path) = rest.split_once('/').unwrap_or((rest, ""));
        if bucket.is_empty() {
            return Err(StorageError::InvalidUri(uri.to_string()));
        }
        Ok(Self {
            bucket: bucket.to_string(),
            path: path.to_string(),
        })
    }

    /// Object key of `name` inside this location, treating `path` as a folder.
    pub fn join(&self, name: &str) -> String {
        let folder = self.path.trim_end_matches('/');
        if folder.is_empty() {
            name.to_string()
        } else {
            format!("{folder}/{name}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_keys_are_one_based_and_unpadded() {
        assert_eq!(staging_key("staging/", "abc", 1), "staging/abc/slice_1.png");
        assert_eq!(staging_key("", "abc", 12), "abc/slice_12.png");
        assert_eq!(study_prefix("staging/", "abc"), "staging/abc/");
    }

    #[test]
    fn result_keys_keep_the_stem() {
        let (mask, seg) = result_keys("staging/abc/slice_7.png").unwrap();
        assert_eq!(mask, "results/abc/slice_7_mask.png");
        assert_eq!(seg, "results_seg/abc/slice_7_seg.png");
    }

    #[test]
    fn result_keys_only_replace_the_suffix() {
        let (mask, _) = result_keys("staging/a.png.dir/slice_1.PNG").unwrap();
        assert_eq!(mask, "results/a.png.dir/slice_1_mask.png");
    }

    #[test]
    fn result_keys_reject_foreign_keys() {
        assert!(result_keys("other/abc/slice_1.png").is_err());
        assert!(result_keys("staging/abc/slice_1.npy").is_err());
    }

    #[test]
    fn png_filter_is_case_insensitive() {
        assert!(is_png("a/slice_1.png"));
        assert!(is_png("a/slice_1.PNG"));
        assert!(!is_png("a/slice_1.npy"));
        assert!(!is_png("a/"));
    }

    #[test]
    fn gs_uri_parsing() {
        let uri = GsUri::parse("gs://models/unet/v1/").unwrap();
        assert_eq!(uri.bucket, "models");
        assert_eq!(uri.path, "unet/v1/");
        assert_eq!(uri.join("model.onnx"), "unet/v1/model.onnx");

        let root = GsUri::parse("gs://models").unwrap();
        assert_eq!(root.join("model.onnx"), "model.onnx");

        assert!(GsUri::parse("s3://models/x").is_err());
        assert!(GsUri::parse("gs:///x").is_err());
    }
}
