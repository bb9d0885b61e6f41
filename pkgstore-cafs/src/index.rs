// SPDX-FileCopyrightText: 2026 pkgstore contributors
// SPDX-License-Identifier: MIT

use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use pkgstore_store_core::PackageFilesIndex;
use tracing::debug;

use crate::Store;
use crate::error::{IoContext, NotFoundExt, StoreError};

impl Store {
    /// Persist `index` at `path`, replacing any previous index atomically.
    pub async fn write_index_file(
        &self,
        path: &Path,
        index: &PackageFilesIndex,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_vec(index).map_err(|source| StoreError::IndexJson {
            path: path.to_owned(),
            source,
        })?;
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_owned(),
            _ => PathBuf::from("."),
        };
        self.ensure_dir(&dir).await?;

        let target = path.to_owned();
        tokio::task::spawn_blocking(move || replace_file(&dir, &target, &json))
            .await?
            .io_context(|| format!("Failed to write files index {}", path.display()))?;
        debug!(path = %path.display(), files = index.files.len(), "wrote files index");
        Ok(())
    }

    /// Load the index at `path`, or `None` if there is none.
    pub async fn read_index_file(
        &self,
        path: &Path,
    ) -> Result<Option<PackageFilesIndex>, StoreError> {
        let Some(data) = tokio::fs::read(path)
            .await
            .not_found_ok()
            .io_context(|| format!("Failed to read files index {}", path.display()))?
        else {
            return Ok(None);
        };
        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|source| StoreError::IndexJson {
                path: path.to_owned(),
                source,
            })
    }
}

fn replace_file(dir: &Path, target: &Path, data: &[u8]) -> io::Result<()> {
    let mut temp = tempfile::Builder::new().prefix(".tmp-").tempfile_in(dir)?;
    temp.write_all(data)?;
    temp.persist(target).map_err(|e| e.error)?;
    Ok(())
}
