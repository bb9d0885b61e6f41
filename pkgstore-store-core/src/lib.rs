// SPDX-FileCopyrightText: 2026 pkgstore contributors
// SPDX-License-Identifier: MIT

//! Core package store semantics.
//!
//! The types and pure functions shared by every layer of the store. Nothing
//! in this crate touches the filesystem.
//!
//! # Key Modules
//!
//! - `content_path` - mapping a digest and file type to a store-relative path
//! - `files_index` - the persisted per-package index of file records
//! - `manifest` - `package.json` parsing and build requirement detection
//!
//! # Design Principles
//!
//! 1. **No IO**: the store crate does the reading and writing
//! 2. **Stable formats**: content paths and index JSON are on-disk protocol
//! 3. **Explicit errors**: all fallible operations return `Result`

pub mod content_path;
pub mod files_index;
pub mod manifest;
mod package;

pub use content_path::{FileType, content_path, content_path_from_hex, file_type_from_mode};
pub use files_index::{FilesMap, PackageFileRecord, PackageFilesIndex, SideEffects};
pub use manifest::{MANIFEST_FILE, Manifest, ManifestError, parse_manifest, requires_build};
pub use package::PackageId;
pub use pkgstore_utils_hash::Hash;
