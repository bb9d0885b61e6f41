// SPDX-FileCopyrightText: 2026 pkgstore contributors
// SPDX-License-Identifier: MIT

//! Verifying that the store still holds every file a package index refers to.
//!
//! Hashing is expensive, so a file is only rehashed when its mtime moved
//! more than [`MODIFICATION_TOLERANCE_MS`] past the record's `checkedAt`.
//! Files that fail are deleted by the verifier so a later install refetches
//! them.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use pkgstore_store_core::{FilesMap, MANIFEST_FILE, PackageFileRecord, PackageFilesIndex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{IoContext, NotFoundExt, StoreError};
use crate::verify::{VerifyResult, read_manifest_bytes};
use crate::{MODIFICATION_TOLERANCE_MS, Store, remove_content, system_time_ms};

pub struct CheckOptions {
    read_manifest: bool,
    cancel: Option<CancellationToken>,
}

impl CheckOptions {
    pub fn new() -> Self {
        Self {
            read_manifest: false,
            cancel: None,
        }
    }

    /// Return the parsed `package.json` of the package.
    pub fn read_manifest(mut self, read_manifest: bool) -> Self {
        self.read_manifest = read_manifest;
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Check `index.files` and, if they all pass, every side-effects group.
    ///
    /// Groups that fail are removed from `index`. They are build outputs
    /// and get rebuilt. `passed` reflects `files` only, and the manifest is
    /// returned even when other files failed.
    pub async fn check(
        self,
        store: &Store,
        index: &mut PackageFilesIndex,
    ) -> Result<VerifyResult, StoreError> {
        let mut checker = Checker {
            store,
            cancel: self.cancel,
            verified: HashSet::new(),
        };

        let result = checker.check_files(&index.files, self.read_manifest).await?;
        if !result.passed {
            return Ok(result);
        }

        if let Some(side_effects) = index.side_effects.as_mut() {
            let mut failed = Vec::new();
            for (name, files) in side_effects.iter() {
                if !checker.check_files(files, false).await?.passed {
                    failed.push(name.clone());
                }
            }
            for name in failed {
                warn!(side_effect = %name, "dropping side effects with missing or corrupted files");
                side_effects.remove(&name);
            }
        }
        Ok(result)
    }
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub async fn check_package_files(
        &self,
        index: &mut PackageFilesIndex,
        read_manifest: bool,
    ) -> Result<VerifyResult, StoreError> {
        CheckOptions::new()
            .read_manifest(read_manifest)
            .check(self, index)
            .await
    }
}

struct Checker<'a> {
    store: &'a Store,
    cancel: Option<CancellationToken>,
    /// Content paths confirmed earlier in this check.
    verified: HashSet<PathBuf>,
}

impl Checker<'_> {
    async fn check_files(
        &mut self,
        files: &FilesMap,
        read_manifest: bool,
    ) -> Result<VerifyResult, StoreError> {
        let mut all_passed = true;
        let mut manifest = None;
        for (name, record) in files {
            if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
                return Err(StoreError::Cancelled);
            }
            let path = self.store.file_path_by_mode(&record.integrity, record.mode);
            let read_file = read_manifest && name == MANIFEST_FILE;
            if !read_file && self.verified.contains(&path) {
                continue;
            }
            let result = self.check_file(&path, record, read_file).await?;
            if read_file {
                manifest = result.manifest;
            }
            if result.passed {
                self.verified.insert(path);
            } else {
                debug!(file = %name, path = %path.display(), "package file failed verification");
                all_passed = false;
            }
        }
        Ok(VerifyResult {
            passed: all_passed,
            manifest,
        })
    }

    async fn check_file(
        &self,
        path: &Path,
        record: &PackageFileRecord,
        read_manifest: bool,
    ) -> Result<VerifyResult, StoreError> {
        let Some(metadata) = tokio::fs::metadata(path)
            .await
            .not_found_ok()
            .io_context(|| format!("Failed to stat {}", path.display()))?
        else {
            return Ok(VerifyResult::failed());
        };

        let mtime = metadata
            .modified()
            .io_context(|| format!("Failed to read mtime of {}", path.display()))?;
        let possibly_modified = system_time_ms(mtime).saturating_sub(record.checked_at_or_epoch())
            > MODIFICATION_TOLERANCE_MS;

        if possibly_modified {
            if metadata.len() != record.size {
                warn!(
                    path = %path.display(),
                    expected = record.size,
                    actual = metadata.len(),
                    "removing store content with wrong size"
                );
                remove_content(path).await?;
                return Ok(VerifyResult::failed());
            }
            return self
                .store
                .verify_file_integrity(path, &record.integrity, read_manifest)
                .await;
        }

        if read_manifest {
            let data = tokio::fs::read(path)
                .await
                .io_context(|| format!("Failed to read {}", path.display()))?;
            return Ok(VerifyResult::passed(Some(read_manifest_bytes(path, &data)?)));
        }
        Ok(VerifyResult::passed(None))
    }
}
