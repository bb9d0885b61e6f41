// SPDX-FileCopyrightText: 2026 pkgstore contributors
// SPDX-License-Identifier: MIT

//! The content-addressable file store.
//!
//! A [`Store`] owns a root directory and writes every file it is handed to
//! `<root>/<hex[0..2]>/<hex[2..]>[-exec]`, where `hex` is the digest of the
//! content. Identical content shared by many packages is therefore kept once.
//!
//! Beyond writing, the store verifies what it holds: single files against a
//! digest, whole [`PackageFilesIndex`]es (including their side-effects
//! groups), and it persists those indices next to the content.
//!
//! [`PackageFilesIndex`]: pkgstore_store_core::PackageFilesIndex

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use pkgstore_store_core::{FileType, Hash, content_path, file_type_from_mode};
use pkgstore_utils_hash::Algorithm;

pub mod check;
pub mod config;
mod dir;
pub mod error;
mod index;
mod verify;
mod write;

pub use check::CheckOptions;
pub use dir::AddToStoreResult;
pub use error::{IoContext, NotFoundExt, StoreError};
pub use verify::VerifyResult;
pub use write::FileWriteResult;

/// Content whose mtime is within this many milliseconds of its `checkedAt`
/// is trusted without rehashing.
pub const MODIFICATION_TOLERANCE_MS: u64 = 100;

/// Handle to a store directory.
///
/// Cloning is cheap and clones share the write ledger and the verification
/// counter, so one handle can be passed to every task working on the store.
#[derive(Clone, Debug)]
pub struct Store {
    inner: Arc<StoreInner>,
}

#[derive(Debug)]
struct StoreInner {
    root: PathBuf,
    algorithm: Algorithm,
    /// Content path → millisecond timestamp at which this process wrote or
    /// verified it.
    ledger: Mutex<HashMap<PathBuf, u64>>,
    created_dirs: Mutex<HashSet<PathBuf>>,
    verified_files: AtomicU64,
}

impl Store {
    /// Open a store rooted at `root`. Nothing is created until the first
    /// write.
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self::with_algorithm(root, Algorithm::default())
    }

    pub fn with_algorithm<P: Into<PathBuf>>(root: P, algorithm: Algorithm) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                root: root.into(),
                algorithm,
                ledger: Mutex::new(HashMap::new()),
                created_dirs: Mutex::new(HashSet::new()),
                verified_files: AtomicU64::new(0),
            }),
        }
    }

    pub fn from_config(config: &config::Config) -> Self {
        Self::with_algorithm(config.store_dir.clone(), config.algorithm)
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// Algorithm used to address newly written content.
    pub fn algorithm(&self) -> Algorithm {
        self.inner.algorithm
    }

    /// How many files had their content read and hashed since this store
    /// was opened. Useful to confirm unmodified content is being trusted.
    pub fn verified_file_count(&self) -> u64 {
        self.inner.verified_files.load(Ordering::Relaxed)
    }

    pub fn file_path(&self, hash: &Hash, file_type: FileType) -> PathBuf {
        self.inner.root.join(content_path(file_type, hash))
    }

    pub fn file_path_by_mode(&self, hash: &Hash, mode: u32) -> PathBuf {
        self.file_path(hash, file_type_from_mode(mode))
    }

    /// Where the files index of the package whose tarball has digest
    /// `integrity` is kept.
    pub fn index_file_path(&self, integrity: &Hash) -> PathBuf {
        self.file_path(integrity, FileType::Index)
    }

    fn count_verification(&self) {
        self.inner.verified_files.fetch_add(1, Ordering::Relaxed);
    }

    fn ledger(&self) -> MutexGuard<'_, HashMap<PathBuf, u64>> {
        self.inner
            .ledger
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn created_dirs(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        self.inner
            .created_dirs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn ensure_dir(&self, dir: &Path) -> Result<(), StoreError> {
        if self.created_dirs().contains(dir) {
            return Ok(());
        }
        tokio::fs::create_dir_all(dir)
            .await
            .io_context(|| format!("Failed to create store directory {}", dir.display()))?;
        self.created_dirs().insert(dir.to_owned());
        Ok(())
    }
}

/// Milliseconds since the Unix epoch.
pub(crate) fn now_ms() -> u64 {
    system_time_ms(SystemTime::now())
}

pub(crate) fn system_time_ms(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Remove `path`, treating an already missing file as success.
pub(crate) async fn remove_content(path: &Path) -> Result<(), StoreError> {
    tokio::fs::remove_file(path)
        .await
        .not_found_ok()
        .io_context(|| format!("Failed to remove {}", path.display()))?;
    Ok(())
}
