// SPDX-FileCopyrightText: 2026 pkgstore contributors
// SPDX-License-Identifier: MIT

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use bytes::Bytes;
use pkgstore_cafs::{IoContext, Store};
use pkgstore_store_core::{Hash, PackageId};
use pkgstore_tarball::{TarballRequest, add_tarball_to_store};
use pkgstore_utils_hash::verify_digest;
use tracing::{info, warn};

use crate::error::CliError;

pub async fn add(
    store: &Store,
    tarball: &Path,
    integrity: Option<String>,
    package: PackageId,
) -> Result<ExitCode, CliError> {
    let buffer = Bytes::from(
        tokio::fs::read(tarball)
            .await
            .io_context(|| format!("Failed to read tarball {}", tarball.display()))?,
    );
    let index_file = match &integrity {
        Some(_) => None,
        None => Some(store.index_file_path(&store.algorithm().digest(&buffer))),
    };

    let added = add_tarball_to_store(
        store,
        TarballRequest {
            buffer,
            integrity,
            package,
            index_file,
        },
    )
    .await?;

    if let Some(path) = &added.index_file {
        println!("{}", path.display());
    }
    println!(
        "{} files{}",
        added.files_index.len(),
        if added.requires_build { " (requires build)" } else { "" }
    );
    Ok(ExitCode::SUCCESS)
}

pub async fn verify(store: &Store, index_path: &Path) -> Result<ExitCode, CliError> {
    let mut index = store
        .read_index_file(index_path)
        .await?
        .ok_or_else(|| CliError::MissingIndex(index_path.to_owned()))?;
    let side_effects_before = index.side_effects.as_ref().map_or(0, |s| s.len());

    let result = store.check_package_files(&mut index, false).await?;

    let side_effects_after = index.side_effects.as_ref().map_or(0, |s| s.len());
    if side_effects_after != side_effects_before {
        info!(
            dropped = side_effects_before - side_effects_after,
            "rewriting files index without broken side effects"
        );
        store.write_index_file(index_path, &index).await?;
    }

    info!(verified = store.verified_file_count(), "verification finished");
    if result.passed {
        println!("ok");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("failed");
        Ok(ExitCode::FAILURE)
    }
}

pub async fn check(integrity: &str, file: &Path) -> Result<ExitCode, CliError> {
    let data = tokio::fs::read(file)
        .await
        .io_context(|| format!("Failed to read {}", file.display()))?;
    match verify_digest(integrity, &data) {
        Ok(_) => {
            println!("ok");
            Ok(ExitCode::SUCCESS)
        }
        Err(err) if err.is_mismatch() => {
            warn!("{err}");
            println!("mismatch");
            Ok(ExitCode::FAILURE)
        }
        Err(err) => Err(err.into()),
    }
}

pub fn content_path(
    store: &Store,
    integrity: &str,
    mode: Option<u32>,
    index: bool,
) -> Result<PathBuf, CliError> {
    let hash: Hash = integrity.parse()?;
    Ok(if index {
        store.index_file_path(&hash)
    } else {
        store.file_path_by_mode(&hash, mode.unwrap_or(0o644))
    })
}
