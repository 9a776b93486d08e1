//! Blob storage backends.
//!
//! Handlers never branch on `LOCAL` vs `CLOUD`: the backend is chosen once at
//! startup by `from_settings` and injected as `Arc<dyn BlobStore>`.

pub mod gcs;
pub mod layout;
pub mod local;

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::config::{AppEnv, ConfigError, Settings};
use crate::gcp::auth::{self, AuthError, StaticToken};

pub use gcs::GcsStore;
pub use local::LocalStore;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Invalid storage URI: {0}")]
    InvalidUri(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Storage API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    Cloud,
}

/// Write/read/list capability over a flat, `/`-separated key space.
pub trait BlobStore: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn write_blob(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), StorageError>;

    fn read_blob(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Keys starting with `prefix`, sorted.
    fn list_blobs(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Human-facing location of a key or folder prefix.
    fn uri_for(&self, key: &str) -> String;
}

/// Build the backend selected by `APP_ENV`.
///
/// Uses blocking HTTP clients; call outside the async runtime.
pub fn from_settings(settings: &Settings) -> Result<Arc<dyn BlobStore>, StorageError> {
    match settings.app_env {
        AppEnv::Local => Ok(Arc::new(LocalStore::create(&settings.local_storage_path)?)),
        AppEnv::Cloud => {
            let bucket = settings
                .bucket_name
                .clone()
                .ok_or(ConfigError::Missing("BUCKET_NAME"))?;
            let store = match &settings.storage_emulator_host {
                // Emulators accept any bearer token.
                Some(host) => GcsStore::new(bucket, Arc::new(StaticToken::new("emulator")))
                    .with_base_url(host),
                None => GcsStore::new(bucket, auth::provider_from_env()?),
            };
            Ok(Arc::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_settings_build_local_store() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("local_storage");
        let settings = Settings::from_lookup(|key| match key {
            "LOCAL_STORAGE_PATH" => Some(root.display().to_string()),
            _ => None,
        })
        .unwrap();

        let store = from_settings(&settings).unwrap();
        assert_eq!(store.kind(), BackendKind::Local);
        assert!(root.is_dir());
    }

    #[test]
    fn cloud_settings_with_emulator_build_gcs_store() {
        let settings = Settings::from_lookup(|key| match key {
            "APP_ENV" => Some("CLOUD".into()),
            "BUCKET_NAME" => Some("scans".into()),
            "STORAGE_EMULATOR_HOST" => Some("localhost:4443".into()),
            _ => None,
        })
        .unwrap();

        let store = from_settings(&settings).unwrap();
        assert_eq!(store.kind(), BackendKind::Cloud);
        assert_eq!(store.uri_for("staging/abc/"), "gs://scans/staging/abc/");
    }
}
