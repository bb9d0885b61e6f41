// SPDX-FileCopyrightText: 2026 pkgstore contributors
// SPDX-License-Identifier: MIT

use std::io;
use std::path::{Component, Path, PathBuf};

use async_compression::tokio::bufread::GzipDecoder;
use bytes::Bytes;
use futures::StreamExt as _;
use pkgstore_cafs::{AddToStoreResult, Store};
use pkgstore_store_core::{MANIFEST_FILE, PackageFileRecord, PackageId, parse_manifest};
use pkgstore_utils_hash::{DigestState, ExpectedDigest, HashingReader};
use tokio::io::{AsyncBufRead, AsyncRead, AsyncReadExt as _, BufReader};
use tokio_tar::Archive;
use tokio_util::either::Either;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::TarballError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

type Filter = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Streams a package tarball into a [`Store`].
///
/// ```no_run
/// # async fn example(store: pkgstore_cafs::Store) -> Result<(), pkgstore_tarball::TarballError> {
/// use pkgstore_tarball::IngestOptions;
///
/// let file = tokio::fs::File::open("a-1.0.0.tgz").await.unwrap();
/// let added = IngestOptions::new()
///     .read_manifest(true)
///     .filter(|path| !path.ends_with(".md"))
///     .ingest(&store, file)
///     .await?;
/// println!("{} files", added.files_index.len());
/// # Ok(())
/// # }
/// ```
pub struct IngestOptions {
    read_manifest: bool,
    filter: Option<Filter>,
    cancel: Option<CancellationToken>,
    expected_integrity: Option<String>,
    package: PackageId,
}

impl IngestOptions {
    pub fn new() -> Self {
        Self {
            read_manifest: false,
            filter: None,
            cancel: None,
            expected_integrity: None,
            package: PackageId::default(),
        }
    }

    /// Parse the tarball's top-level `package.json`.
    pub fn read_manifest(mut self, read_manifest: bool) -> Self {
        self.read_manifest = read_manifest;
        self
    }

    /// Only add entries whose relative path is accepted by `filter`.
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(filter));
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Check the raw tarball bytes against `integrity` once the stream has
    /// been consumed.
    pub fn expected_integrity(mut self, integrity: impl Into<String>) -> Self {
        self.expected_integrity = Some(integrity.into());
        self
    }

    /// Package named in integrity errors.
    pub fn package(mut self, package: PackageId) -> Self {
        self.package = package;
        self
    }

    pub async fn ingest<R>(self, store: &Store, reader: R) -> Result<AddToStoreResult, TarballError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let expected = self
            .expected_integrity
            .as_deref()
            .map(ExpectedDigest::parse)
            .transpose()
            .map_err(|source| TarballError::integrity(&self.package, source))?;
        let algorithm = expected
            .as_ref()
            .map_or_else(|| store.algorithm(), ExpectedDigest::algorithm);

        let (mut hashing, digest) = HashingReader::with_algorithm(reader, algorithm);
        let magic = read_prefix(&mut hashing, GZIP_MAGIC.len())
            .await
            .map_err(TarballError::Malformed)?;
        let is_gzip = magic == GZIP_MAGIC;
        let raw = BufReader::new(io::Cursor::new(magic).chain(hashing));
        let source = if is_gzip {
            Either::Right(GzipDecoder::new(raw))
        } else {
            Either::Left(raw)
        };

        let mut archive = Archive::new(source);
        let result = self.add_entries(store, &mut archive).await?;

        let source = archive.into_inner().map_err(|_| {
            TarballError::Malformed(io::Error::other("tar reader still borrowed after extraction"))
        })?;
        drain(source).await.map_err(TarballError::Malformed)?;

        if let Some(expected) = expected {
            let (size, actual) = DigestState::finish_shared(&digest);
            expected
                .check(&actual)
                .map_err(|source| TarballError::integrity(&self.package, source))?;
            debug!(package = %self.package, size, "tarball integrity verified");
        }
        Ok(result)
    }

    async fn add_entries<R>(
        &self,
        store: &Store,
        archive: &mut Archive<R>,
    ) -> Result<AddToStoreResult, TarballError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut result = AddToStoreResult::default();
        let mut manifest_bytes = None;

        let mut entries = archive.entries().map_err(TarballError::Malformed)?;
        while let Some(entry) = entries.next().await {
            if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
                return Err(TarballError::Cancelled);
            }
            let mut entry = entry.map_err(TarballError::Malformed)?;
            let header = entry.header();
            if !header.entry_type().is_file() {
                trace!(entry_type = ?header.entry_type(), "skipping non-file tar entry");
                continue;
            }
            let mode = header.mode().map_err(TarballError::Malformed)?;
            let raw_path = entry.path().map_err(TarballError::Malformed)?;
            let Some(relative) = normalize_entry_path(&raw_path)? else {
                continue;
            };
            if self.filter.as_ref().is_some_and(|accept| !accept(&relative)) {
                trace!(path = %relative, "filtered out");
                continue;
            }

            let mut buffer = Vec::new();
            entry
                .read_to_end(&mut buffer)
                .await
                .map_err(TarballError::Malformed)?;
            let buffer = Bytes::from(buffer);
            if self.read_manifest && relative == MANIFEST_FILE {
                manifest_bytes = Some(buffer.clone());
            }

            let size = buffer.len() as u64;
            let written = store.write_buffer(buffer, mode).await?;
            trace!(path = %relative, size, content = %written.path.display(), "added tar entry");
            result.files_index.insert(
                relative,
                PackageFileRecord {
                    integrity: written.integrity,
                    mode,
                    size,
                    checked_at: Some(written.checked_at),
                },
            );
        }

        result.manifest = manifest_bytes
            .map(|bytes| parse_manifest(&bytes))
            .transpose()?;
        Ok(result)
    }
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Read up to `len` bytes, fewer only at end of input.
async fn read_prefix<R>(reader: &mut R, len: usize) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = Vec::with_capacity(len);
    reader.take(len as u64).read_to_end(&mut prefix).await?;
    Ok(prefix)
}

/// Read whatever the tar parser left unread so the digest covers the whole
/// input, including a compressed stream's trailer.
async fn drain<R>(source: Either<R, GzipDecoder<R>>) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut sink = tokio::io::sink();
    match source {
        Either::Left(mut raw) => {
            tokio::io::copy(&mut raw, &mut sink).await?;
        }
        Either::Right(mut decoder) => {
            tokio::io::copy(&mut decoder, &mut sink).await?;
            let mut raw = decoder.into_inner();
            tokio::io::copy(&mut raw, &mut sink).await?;
        }
    }
    Ok(())
}

/// Turn a tar entry path into a `/`-separated package-relative path.
///
/// `./` components are dropped. Absolute paths and `..` are rejected.
/// Returns `None` for paths that name the package root itself.
pub(crate) fn normalize_entry_path(path: &Path) -> Result<Option<String>, TarballError> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::Normal(part) => parts.push(part.to_string_lossy()),
            Component::ParentDir | Component::RootDir | Component::Prefix(..) => {
                return Err(TarballError::PathTraversal(PathBuf::from(path)));
            }
        }
    }
    if parts.is_empty() {
        return Ok(None);
    }
    Ok(Some(parts.join("/")))
}
