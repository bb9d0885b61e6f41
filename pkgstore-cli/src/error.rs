// SPDX-FileCopyrightText: 2026 pkgstore contributors
// SPDX-License-Identifier: MIT

use std::path::PathBuf;

use pkgstore_cafs::StoreError;
use pkgstore_cafs::config::ConfigError;
use pkgstore_tarball::TarballError;
use pkgstore_utils_hash::IntegrityError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Tarball(#[from] TarballError),

    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    #[error("no files index at {}", .0.display())]
    MissingIndex(PathBuf),
}
