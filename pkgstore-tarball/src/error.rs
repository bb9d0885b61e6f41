// SPDX-FileCopyrightText: 2026 pkgstore contributors
// SPDX-License-Identifier: MIT

use std::io;
use std::path::PathBuf;

use pkgstore_cafs::StoreError;
use pkgstore_store_core::{ManifestError, PackageId};
use pkgstore_utils_hash::IntegrityError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TarballError {
    #[error("integrity check failed for {package}: {source}")]
    Integrity {
        package: PackageId,
        #[source]
        source: IntegrityError,
    },

    #[error("malformed tarball: {0}")]
    Malformed(#[source] io::Error),

    #[error("path traversal attempt in archive: {}", .0.display())]
    PathTraversal(PathBuf),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("tarball ingestion cancelled")]
    Cancelled,
}

impl TarballError {
    pub fn integrity(package: &PackageId, source: IntegrityError) -> Self {
        Self::Integrity {
            package: package.clone(),
            source,
        }
    }

    /// The content did not match its expected digest, as opposed to the
    /// digest itself being unusable.
    pub fn is_integrity_mismatch(&self) -> bool {
        matches!(self, Self::Integrity { source, .. } if source.is_mismatch())
    }
}
