// SPDX-FileCopyrightText: 2026 pkgstore contributors
// SPDX-License-Identifier: MIT

//! The per-package files index.
//!
//! Persisted as JSON next to the content it describes:
//!
//! ```json
//! {
//!   "name": "a",
//!   "version": "1.0.0",
//!   "requiresBuild": false,
//!   "files": {
//!     "package.json": { "integrity": "sha512-…", "mode": 420, "size": 33, "checkedAt": 1700000000000 }
//!   },
//!   "sideEffects": { "linux-x64-node20": { "build/addon.node": { … } } }
//! }
//! ```
//!
//! `name`, `version` and `checkedAt` are optional so indices written by older
//! store versions still load.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Hash;
use crate::content_path::{FileType, content_path, file_type_from_mode};

/// Relative path inside a package → record.
pub type FilesMap = BTreeMap<String, PackageFileRecord>;

/// Side-effect cache key (usually platform/arch/runtime) → files of that build.
pub type SideEffects = BTreeMap<String, FilesMap>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageFileRecord {
    pub integrity: Hash,
    pub mode: u32,
    pub size: u64,
    /// Milliseconds since the Unix epoch at which the content was last
    /// written or verified. Missing means never.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked_at: Option<u64>,
}

impl PackageFileRecord {
    pub fn file_type(&self) -> FileType {
        file_type_from_mode(self.mode)
    }

    /// Store-relative location of this record's content.
    pub fn content_path(&self) -> std::path::PathBuf {
        content_path(self.file_type(), &self.integrity)
    }

    pub fn checked_at_or_epoch(&self) -> u64 {
        self.checked_at.unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageFilesIndex {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_build: Option<bool>,
    pub files: FilesMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side_effects: Option<SideEffects>,
}

impl PackageFilesIndex {
    pub fn new(files: FilesMap) -> Self {
        Self {
            files,
            ..Default::default()
        }
    }

    /// Number of records across `files` and every side-effect group.
    pub fn record_count(&self) -> usize {
        self.files.len()
            + self
                .side_effects
                .iter()
                .flat_map(|groups| groups.values())
                .map(BTreeMap::len)
                .sum::<usize>()
    }
}
