//! Filesystem backend: keys are relative paths under a root folder.

use std::fs;
use std::path::{Component, Path, PathBuf};

use super::{BackendKind, BlobStore, StorageError};

pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Open `root`, creating it if missing.
    pub fn create(root: &Path) -> Result<Self, StorageError> {
        fs::create_dir_all(root).map_err(|source| StorageError::Io {
            path: root.to_path_buf(),
            source,
        })?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `key` below the root, refusing anything that could escape it.
    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && !key.contains('\\')
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }

    fn collect_files(&self, dir: &Path, out: &mut Vec<String>) -> Result<(), StorageError> {
        let io_err = |source| StorageError::Io {
            path: dir.to_path_buf(),
            source,
        };
        for entry in fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.is_dir() {
                self.collect_files(&path, out)?;
            } else if let Ok(relative) = path.strip_prefix(&self.root) {
                let key: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                out.push(key.join("/"));
            }
        }
        Ok(())
    }
}

impl BlobStore for LocalStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn write_blob(&self, key: &str, bytes: &[u8], _content_type: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&path, bytes).map_err(|source| StorageError::Io { path, source })
    }

    fn read_blob(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(key)?;
        fs::read(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(key.to_string())
            } else {
                StorageError::Io { path, source }
            }
        })
    }

    fn list_blobs(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        // Walk from the deepest folder named by the prefix.
        let folder = match prefix.rfind('/') {
            Some(end) => self.path_for(&prefix[..end])?,
            None => self.root.clone(),
        };
        if !folder.is_dir() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        self.collect_files(&folder, &mut keys)?;
        keys.retain(|key| key.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }

    fn uri_for(&self, key: &str) -> String {
        let joined = self.root.join(key.trim_end_matches('/'));
        std::path::absolute(&joined)
            .unwrap_or(joined)
            .display()
            .to_string()
    }
}
