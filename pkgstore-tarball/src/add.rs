// SPDX-FileCopyrightText: 2026 pkgstore contributors
// SPDX-License-Identifier: MIT

use std::path::PathBuf;

use bytes::Bytes;
use pkgstore_cafs::Store;
use pkgstore_store_core::{FilesMap, Manifest, PackageFilesIndex, PackageId, requires_build};
use pkgstore_utils_hash::{Hash, verify_digest};
use tracing::{debug, info};

use crate::{IngestOptions, TarballError};

/// A downloaded package tarball to add to the store.
#[derive(Debug, Clone, Default)]
pub struct TarballRequest {
    pub buffer: Bytes,
    /// Integrity string published for the tarball. Checked before anything
    /// is extracted.
    pub integrity: Option<String>,
    pub package: PackageId,
    /// Where to persist the files index. Defaults to the index path derived
    /// from `integrity`; without either no index is written.
    pub index_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AddTarballResult {
    pub files_index: FilesMap,
    pub manifest: Option<Manifest>,
    pub requires_build: bool,
    pub index_file: Option<PathBuf>,
}

/// Verify a fully downloaded tarball, add its files to `store` and record
/// them in a files index.
///
/// Nothing is written when the integrity check fails.
pub async fn add_tarball_to_store(
    store: &Store,
    request: TarballRequest,
) -> Result<AddTarballResult, TarballError> {
    let TarballRequest {
        buffer,
        integrity,
        package,
        index_file,
    } = request;

    let tarball_hash: Option<Hash> = integrity
        .as_deref()
        .map(|integrity| verify_digest(integrity, &buffer))
        .transpose()
        .map_err(|source| TarballError::integrity(&package, source))?;

    let added = IngestOptions::new()
        .read_manifest(true)
        .package(package.clone())
        .ingest(store, buffer.as_ref())
        .await?;

    let requires_build = requires_build(
        added.manifest.as_ref(),
        added.files_index.keys().map(String::as_str),
    );
    let manifest_id = added
        .manifest
        .as_ref()
        .map(Manifest::package_id)
        .unwrap_or_default();

    let index_file =
        index_file.or_else(|| tarball_hash.as_ref().map(|hash| store.index_file_path(hash)));
    if let Some(path) = &index_file {
        let index = PackageFilesIndex {
            name: manifest_id.name.or(package.name.clone()),
            version: manifest_id.version.or(package.version.clone()),
            requires_build: Some(requires_build),
            files: added.files_index.clone(),
            side_effects: None,
        };
        store.write_index_file(path, &index).await?;
        debug!(path = %path.display(), "persisted files index");
    }

    info!(
        package = %package,
        files = added.files_index.len(),
        requires_build,
        "added tarball to store"
    );
    Ok(AddTarballResult {
        files_index: added.files_index,
        manifest: added.manifest,
        requires_build,
        index_file,
    })
}
