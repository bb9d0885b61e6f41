// SPDX-FileCopyrightText: 2026 pkgstore contributors
// SPDX-License-Identifier: MIT

use std::path::{Path, PathBuf};

use bytes::Bytes;
use pkgstore_store_core::{FilesMap, MANIFEST_FILE, Manifest, PackageFileRecord};
use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::Store;
use crate::error::{IoContext, StoreError};
use crate::verify::read_manifest_bytes;

/// Files added to the store for one package.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddToStoreResult {
    pub files_index: FilesMap,
    pub manifest: Option<Manifest>,
}

struct DirEntry {
    relative: String,
    path: PathBuf,
    mode: u32,
}

impl Store {
    /// Add every regular file below `dir` to the store.
    ///
    /// Symlinks are not followed. Index keys are `/`-separated paths
    /// relative to `dir`.
    pub async fn add_files_from_dir(
        &self,
        dir: &Path,
        read_manifest: bool,
    ) -> Result<AddToStoreResult, StoreError> {
        let root = dir.to_owned();
        let entries = tokio::task::spawn_blocking(move || collect_files(&root)).await??;
        debug!(dir = %dir.display(), files = entries.len(), "adding directory to store");

        let mut result = AddToStoreResult::default();
        for entry in entries {
            let data = tokio::fs::read(&entry.path)
                .await
                .io_context(|| format!("Failed to read {}", entry.path.display()))?;
            if read_manifest && entry.relative == MANIFEST_FILE {
                result.manifest = Some(read_manifest_bytes(&entry.path, &data)?);
            }
            let size = data.len() as u64;
            let written = self.write_buffer(Bytes::from(data), entry.mode).await?;
            trace!(file = %entry.relative, path = %written.path.display(), "added file");
            result.files_index.insert(
                entry.relative,
                PackageFileRecord {
                    integrity: written.integrity,
                    mode: entry.mode,
                    size,
                    checked_at: Some(written.checked_at),
                },
            );
        }
        Ok(result)
    }
}

fn collect_files(root: &Path) -> Result<Vec<DirEntry>, StoreError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| {
            let context = format!("Failed to walk {}", root.display());
            StoreError::io(context, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let metadata = entry.metadata().map_err(|e| {
            StoreError::io(format!("Failed to stat {}", entry.path().display()), e.into())
        })?;
        files.push(DirEntry {
            relative,
            path: entry.into_path(),
            mode: file_mode(&metadata),
        });
    }
    Ok(files)
}

#[cfg(unix)]
fn file_mode(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt as _;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn file_mode(_metadata: &std::fs::Metadata) -> u32 {
    0o644
}
