// SPDX-FileCopyrightText: 2026 pkgstore contributors
// SPDX-License-Identifier: MIT

//! `package.json` handling.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::PackageId;

pub const MANIFEST_FILE: &str = "package.json";

/// Lifecycle scripts that run on install and therefore force a build.
const INSTALL_SCRIPTS: [&str; 3] = ["preinstall", "install", "postinstall"];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Error)]
#[error("invalid package manifest: {0}")]
pub struct ManifestError(#[from] serde_json::Error);

/// A parsed `package.json`.
///
/// Only the fields the store looks at are typed. Everything else is kept
/// in `other` so the manifest can be handed on unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub scripts: BTreeMap<String, String>,
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

impl Manifest {
    pub fn package_id(&self) -> PackageId {
        PackageId {
            name: self.name.clone(),
            version: self.version.clone(),
        }
    }

    pub fn has_install_scripts(&self) -> bool {
        INSTALL_SCRIPTS
            .iter()
            .any(|script| self.scripts.contains_key(*script))
    }
}

pub fn parse_manifest(bytes: &[u8]) -> Result<Manifest, ManifestError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    Ok(serde_json::from_slice(bytes)?)
}

/// Whether installing the package has to run a build step.
///
/// `files` are the package-relative paths of everything the package ships.
pub fn requires_build<'a, I>(manifest: Option<&Manifest>, files: I) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    if manifest.is_some_and(Manifest::has_install_scripts) {
        return true;
    }
    files
        .into_iter()
        .any(|path| path == "binding.gyp" || path.starts_with(".hooks/"))
}
