use std::path::PathBuf;

use thiserror::Error;

use crate::volume::SliceAxisPolicy;

/// Application-level constants
pub const APP_NAME: &str = "Brainslice";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default `tracing` filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "info,tower_http=info"
}

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_LOCAL_STORAGE_PATH: &str = "local_storage";
pub const DEFAULT_MAX_UPLOAD_MB: usize = 1024;

/// Staging namespace inside the cloud bucket.
pub const CLOUD_STAGING_PREFIX: &str = "staging/";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has an invalid value: {value:?}")]
    Invalid { var: &'static str, value: String },

    #[error("{0} must be set")]
    Missing(&'static str),
}

/// Where the service runs, selected by `APP_ENV` (or `ENV`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Local,
    Cloud,
}

impl AppEnv {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "LOCAL" => Some(Self::Local),
            "CLOUD" => Some(Self::Cloud),
            _ => None,
        }
    }

    /// Read `APP_ENV`, falling back to `ENV`, defaulting to `LOCAL`.
    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (var, raw) = match lookup("APP_ENV") {
            Some(v) => ("APP_ENV", v),
            None => match lookup("ENV") {
                Some(v) => ("ENV", v),
                None => return Ok(Self::Local),
            },
        };
        Self::parse(&raw).ok_or(ConfigError::Invalid { var, value: raw })
    }
}

/// Settings of the ingestion service, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub app_env: AppEnv,
    pub bucket_name: Option<String>,
    pub port: u16,
    pub local_storage_path: PathBuf,
    pub upload_tmp_dir: PathBuf,
    pub slice_axis: SliceAxisPolicy,
    pub max_upload_bytes: usize,
    /// Overrides the Cloud Storage endpoint (fake-gcs-server and friends).
    pub storage_emulator_host: Option<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let app_env = AppEnv::from_lookup(&lookup)?;

        let bucket_name = lookup("BUCKET_NAME");
        if app_env == AppEnv::Cloud && bucket_name.is_none() {
            return Err(ConfigError::Missing("BUCKET_NAME"));
        }

        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid { var: "PORT", value: raw })?,
            None => DEFAULT_PORT,
        };

        let slice_axis = match lookup("SLICE_AXIS") {
            Some(raw) => SliceAxisPolicy::parse(&raw)
                .ok_or(ConfigError::Invalid { var: "SLICE_AXIS", value: raw })?,
            None => SliceAxisPolicy::Smallest,
        };

        let max_upload_mb = match lookup("MAX_UPLOAD_MB") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|mb| *mb > 0)
                .ok_or(ConfigError::Invalid { var: "MAX_UPLOAD_MB", value: raw })?,
            None => DEFAULT_MAX_UPLOAD_MB,
        };

        Ok(Self {
            app_env,
            bucket_name,
            port,
            local_storage_path: lookup("LOCAL_STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOCAL_STORAGE_PATH)),
            upload_tmp_dir: lookup("UPLOAD_TMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
            slice_axis,
            max_upload_bytes: max_upload_mb * 1024 * 1024,
            storage_emulator_host: lookup("STORAGE_EMULATOR_HOST"),
        })
    }

    /// Key prefix under which study folders are written.
    ///
    /// The local backend already roots everything in its own folder, so
    /// studies sit directly below it.
    pub fn staging_prefix(&self) -> &'static str {
        match self.app_env {
            AppEnv::Local => "",
            AppEnv::Cloud => CLOUD_STAGING_PREFIX,
        }
    }
}
