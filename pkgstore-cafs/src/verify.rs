// SPDX-FileCopyrightText: 2026 pkgstore contributors
// SPDX-License-Identifier: MIT

use std::path::Path;

use pkgstore_store_core::{Hash, Manifest, parse_manifest};
use tracing::warn;

use crate::error::{IoContext, NotFoundExt, StoreError};
use crate::{Store, remove_content};

/// Outcome of verifying content against its expected digest.
///
/// A failed verification is not an error: the caller refetches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerifyResult {
    pub passed: bool,
    pub manifest: Option<Manifest>,
}

impl VerifyResult {
    pub(crate) fn passed(manifest: Option<Manifest>) -> Self {
        Self {
            passed: true,
            manifest,
        }
    }

    pub(crate) fn failed() -> Self {
        Self::default()
    }
}

impl Store {
    /// Read `path` and check its content hashes to `expected`.
    ///
    /// Content that does not match is deleted so the next write replaces it.
    /// A missing file fails verification. With `read_manifest` the verified
    /// bytes are also parsed as `package.json`.
    pub async fn verify_file_integrity(
        &self,
        path: &Path,
        expected: &Hash,
        read_manifest: bool,
    ) -> Result<VerifyResult, StoreError> {
        self.count_verification();
        let Some(data) = tokio::fs::read(path)
            .await
            .not_found_ok()
            .io_context(|| format!("Failed to read {}", path.display()))?
        else {
            return Ok(VerifyResult::failed());
        };

        let actual = expected.algorithm().digest(&data);
        if actual != *expected {
            warn!(
                path = %path.display(),
                expected = %expected,
                actual = %actual,
                "removing corrupted store content"
            );
            remove_content(path).await?;
            return Ok(VerifyResult::failed());
        }

        let manifest = if read_manifest {
            Some(read_manifest_bytes(path, &data)?)
        } else {
            None
        };
        Ok(VerifyResult::passed(manifest))
    }
}

pub(crate) fn read_manifest_bytes(path: &Path, data: &[u8]) -> Result<Manifest, StoreError> {
    parse_manifest(data).map_err(|source| StoreError::Manifest {
        path: path.to_owned(),
        source,
    })
}
