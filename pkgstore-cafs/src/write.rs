// SPDX-FileCopyrightText: 2026 pkgstore contributors
// SPDX-License-Identifier: MIT

use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use pkgstore_store_core::{Hash, file_type_from_mode};
use tempfile::NamedTempFile;
use tracing::{debug, trace, warn};

use crate::error::{IoContext, NotFoundExt, StoreError};
use crate::{Store, now_ms, remove_content};

/// Where a buffer ended up and when it was last confirmed on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileWriteResult {
    pub integrity: Hash,
    pub path: PathBuf,
    /// Milliseconds since the Unix epoch.
    pub checked_at: u64,
}

impl Store {
    /// Add `buffer` to the store as content with permission bits `mode`.
    ///
    /// Content already written by this process is not touched again. Content
    /// found on disk from an earlier run is verified first and rewritten only
    /// if it does not match.
    pub async fn write_buffer(
        &self,
        buffer: Bytes,
        mode: u32,
    ) -> Result<FileWriteResult, StoreError> {
        let integrity = self.algorithm().digest(&buffer);
        let file_type = file_type_from_mode(mode);
        let path = self.file_path(&integrity, file_type);

        let recorded = self.ledger().get(&path).copied();
        if let Some(checked_at) = recorded {
            trace!(path = %path.display(), "content already written by this process");
            return Ok(FileWriteResult {
                integrity,
                path,
                checked_at,
            });
        }

        if self.exists_same(&path, &integrity, buffer.len() as u64).await? {
            let checked_at = now_ms();
            self.ledger().insert(path.clone(), checked_at);
            debug!(path = %path.display(), "reusing verified store content");
            return Ok(FileWriteResult {
                integrity,
                path,
                checked_at,
            });
        }

        let dir = path
            .parent()
            .ok_or_else(|| {
                StoreError::io(
                    format!("content path {} has no parent", path.display()),
                    io::Error::from(io::ErrorKind::InvalidInput),
                )
            })?
            .to_owned();
        self.ensure_dir(&dir).await?;

        let target = path.clone();
        let permissions = file_type.store_mode();
        tokio::task::spawn_blocking(move || write_atomic(&dir, &target, &buffer, permissions))
            .await?
            .io_context(|| format!("Failed to write store content {}", path.display()))?;

        let checked_at = now_ms();
        self.ledger().insert(path.clone(), checked_at);
        debug!(path = %path.display(), "wrote store content");
        Ok(FileWriteResult {
            integrity,
            path,
            checked_at,
        })
    }

    /// Whether `path` already holds content matching `integrity`. Anything
    /// else found there is removed.
    async fn exists_same(
        &self,
        path: &Path,
        integrity: &Hash,
        size: u64,
    ) -> Result<bool, StoreError> {
        let Some(metadata) = tokio::fs::metadata(path)
            .await
            .not_found_ok()
            .io_context(|| format!("Failed to stat {}", path.display()))?
        else {
            return Ok(false);
        };
        if metadata.len() != size {
            warn!(
                path = %path.display(),
                expected = size,
                actual = metadata.len(),
                "removing store content with wrong size"
            );
            remove_content(path).await?;
            return Ok(false);
        }
        Ok(self.verify_file_integrity(path, integrity, false).await?.passed)
    }
}

/// Write `data` to a fresh temporary file in `dir` and rename it over
/// `target`. Concurrent writers of the same content race harmlessly.
fn write_atomic(dir: &Path, target: &Path, data: &[u8], mode: u32) -> io::Result<()> {
    let mut temp = tempfile::Builder::new()
        .prefix(".tmp-")
        .tempfile_in(dir)?;
    temp.write_all(data)?;
    set_mode(&temp, mode)?;
    temp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(unix)]
fn set_mode(file: &NamedTempFile, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt as _;
    file.as_file()
        .set_permissions(std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_file: &NamedTempFile, _mode: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use pkgstore_utils_test::CanonicalTempDir;

    use super::*;

    #[test_log::test(tokio::test)]
    async fn second_write_hits_ledger() {
        let dir = CanonicalTempDir::new().unwrap();
        let store = Store::new(dir.path());

        let first = store.write_buffer(Bytes::from_static(b"hello"), 0o644).await.unwrap();
        assert_eq!(std::fs::read(&first.path).unwrap(), b"hello");

        std::fs::remove_file(&first.path).unwrap();
        let second = store.write_buffer(Bytes::from_static(b"hello"), 0o644).await.unwrap();
        assert_eq!(second, first);
        assert!(!second.path.exists(), "ledger hits must not touch the disk");
        assert_eq!(store.verified_file_count(), 0);
    }

    #[test_log::test(tokio::test)]
    async fn existing_content_is_verified_not_rewritten() {
        let dir = CanonicalTempDir::new().unwrap();
        let written = Store::new(dir.path())
            .write_buffer(Bytes::from_static(b"shared"), 0o644)
            .await
            .unwrap();

        let reopened = Store::new(dir.path());
        let again = reopened
            .write_buffer(Bytes::from_static(b"shared"), 0o644)
            .await
            .unwrap();
        assert_eq!(again.path, written.path);
        assert_eq!(reopened.verified_file_count(), 1);
    }

    #[test_log::test(tokio::test)]
    async fn corrupted_content_is_replaced() {
        let dir = CanonicalTempDir::new().unwrap();
        let written = Store::new(dir.path())
            .write_buffer(Bytes::from_static(b"payload"), 0o644)
            .await
            .unwrap();

        // Same size, different bytes.
        std::fs::write(&written.path, b"PAYLOAD").unwrap();
        let reopened = Store::new(dir.path());
        reopened
            .write_buffer(Bytes::from_static(b"payload"), 0o644)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&written.path).unwrap(), b"payload");

        // Different size.
        std::fs::write(&written.path, b"truncated payload").unwrap();
        Store::new(dir.path())
            .write_buffer(Bytes::from_static(b"payload"), 0o644)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&written.path).unwrap(), b"payload");
    }

    #[cfg(unix)]
    #[test_log::test(tokio::test)]
    async fn permissions_follow_file_type() {
        use std::os::unix::fs::PermissionsExt as _;

        let dir = CanonicalTempDir::new().unwrap();
        let store = Store::new(dir.path());

        let exec = store.write_buffer(Bytes::from_static(b"#!/bin/sh"), 0o775).await.unwrap();
        let plain = store.write_buffer(Bytes::from_static(b"#!/bin/sh"), 0o744).await.unwrap();
        assert_ne!(exec.path, plain.path);
        assert!(exec.path.to_string_lossy().ends_with("-exec"));

        let mode = |p: &Path| std::fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&exec.path), 0o755);
        assert_eq!(mode(&plain.path), 0o644);
    }

    #[test_log::test(tokio::test)]
    async fn no_temp_files_left_behind() {
        let dir = CanonicalTempDir::new().unwrap();
        let store = Store::new(dir.path());
        let written = store.write_buffer(Bytes::from_static(b"x"), 0o644).await.unwrap();

        let shard = written.path.parent().unwrap();
        let names: Vec<_> = std::fs::read_dir(shard)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![written.path.file_name().unwrap().to_owned()]);
    }
}
