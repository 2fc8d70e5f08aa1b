// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Directory-backed storage.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use super::{Storage, StorageError};

/// Stores each object as a file under `root`.
///
/// Uploads write a sibling temp file and rename it into place so readers
/// never observe a half-written document.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map an object path onto the filesystem, refusing anything that would
    /// escape `root`.
    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path.trim_start_matches('/'));
        let mut resolved = self.root.clone();
        let mut depth = 0;
        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    resolved.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                _ => return Err(StorageError::InvalidPath(path.to_string())),
            }
        }
        if depth == 0 {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        Ok(resolved)
    }
}

#[async_trait]
impl Storage for FsStorage {
    fn name(&self) -> &str {
        "fs"
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let file = self.resolve(path)?;
        tokio::fs::read(&file).await.map_err(|e| StorageError::io(path, e))
    }

    async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        let file = self.resolve(path)?;
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| StorageError::io(path, e))?;
        }
        let mut tmp_name = file.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));
        let tmp = file.with_file_name(tmp_name);

        if let Err(e) = tokio::fs::write(&tmp, &bytes).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(StorageError::io(path, e));
        }
        if let Err(e) = tokio::fs::rename(&tmp, &file).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(StorageError::io(path, e));
        }
        tracing::trace!(path, bytes = bytes.len(), "object written");
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let file = self.resolve(path)?;
        tokio::fs::try_exists(&file).await.map_err(|e| StorageError::io(path, e))
    }
}

#[cfg(test)]
#[path = "fs_tests.rs"]
mod tests;
