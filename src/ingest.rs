//! Upload → slices: stage a NIfTI upload, reorient it and store one PNG per slice.
//!
//! Blocking throughout; the HTTP layer runs it on the blocking pool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::png;
use crate::storage::layout::{staging_key, study_prefix};
use crate::storage::{BackendKind, BlobStore, StorageError};
use crate::volume::{normalize_slice, SliceAxisPolicy, Volume, VolumeError};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to stage upload: {0}")]
    TempFile(#[from] std::io::Error),

    #[error("Invalid volume: {0}")]
    Volume(#[from] VolumeError),

    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Outcome of one successful upload.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub study_id: Uuid,
    /// Where the slices went: an absolute folder or a `gs://` prefix.
    pub folder_uri: String,
    pub slices: usize,
    #[serde(skip)]
    pub backend: BackendKind,
}

pub struct Ingestor {
    store: Arc<dyn BlobStore>,
    temp_dir: PathBuf,
    staging_prefix: String,
    policy: SliceAxisPolicy,
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn BlobStore>,
        temp_dir: impl Into<PathBuf>,
        staging_prefix: impl Into<String>,
        policy: SliceAxisPolicy,
    ) -> Self {
        Self {
            store,
            temp_dir: temp_dir.into(),
            staging_prefix: staging_prefix.into(),
            policy,
        }
    }

    pub fn backend(&self) -> BackendKind {
        self.store.kind()
    }

    /// Slice `upload` into PNGs under a fresh study id.
    ///
    /// All-or-nothing from the caller's view: the first failure aborts the
    /// request. Slices already written stay in storage.
    pub fn ingest(&self, upload: &[u8]) -> Result<IngestReport, IngestError> {
        let study_id = Uuid::new_v4();
        tracing::info!(%study_id, bytes = upload.len(), "Processing upload");

        match self.slice_study(study_id, upload) {
            Ok(slices) => {
                let folder_uri = self
                    .store
                    .uri_for(&study_prefix(&self.staging_prefix, &study_id.to_string()));
                tracing::info!(%study_id, slices, folder = %folder_uri, "Study staged");
                Ok(IngestReport {
                    study_id,
                    folder_uri,
                    slices,
                    backend: self.store.kind(),
                })
            }
            Err(e) => {
                tracing::error!(%study_id, error = %e, "Error processing upload");
                Err(e)
            }
        }
    }

    fn slice_study(&self, study_id: Uuid, upload: &[u8]) -> Result<usize, IngestError> {
        // Removed when `staged` drops, on every path out of this function.
        let staged = self.stage_upload(study_id, upload)?;

        let volume = Volume::open(staged.path())?.canonical()?;
        let axis = self.policy.select(volume.shape());
        let id = study_id.to_string();
        tracing::debug!(%study_id, shape = ?volume.shape(), axis, "Volume loaded");

        let mut count = 0;
        for (i, view) in volume.slices(axis).enumerate() {
            let index = i + 1;
            let slice = normalize_slice(view);
            if slice.constant {
                tracing::warn!(%study_id, slice = index, "Slice has constant intensity, emitting black image");
            }
            let bytes = slice.to_png()?;
            self.store
                .write_blob(&staging_key(&self.staging_prefix, &id, index), &bytes, png::CONTENT_TYPE)?;
            count = index;
        }
        Ok(count)
    }

    fn stage_upload(&self, study_id: Uuid, upload: &[u8]) -> Result<tempfile::NamedTempFile, IngestError> {
        let suffix = if upload.starts_with(&GZIP_MAGIC) { ".nii.gz" } else { ".nii" };
        std::fs::create_dir_all(&self.temp_dir)?;
        let mut file = tempfile::Builder::new()
            .prefix(&format!("temp_{study_id}"))
            .suffix(suffix)
            .rand_bytes(0)
            .tempfile_in(&self.temp_dir)?;
        file.write_all(upload)?;
        file.flush()?;
        Ok(file)
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }
}
