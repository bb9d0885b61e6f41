// SPDX-FileCopyrightText: 2026 pkgstore contributors
// SPDX-License-Identifier: MIT

//! Content addressing.
//!
//! A file's location inside the store is a pure function of its digest and
//! a coarse [`FileType`]:
//!
//! ```text
//! <hex[0..2]>/<hex[2..]>              non-executable
//! <hex[0..2]>/<hex[2..]>-exec         executable
//! <hex[0..2]>/<hex[2..]>-index.json   package files index
//! ```
//!
//! Only the execute bits of a mode influence the address. The full mode is
//! kept in [`PackageFileRecord`](crate::PackageFileRecord) instead.

use std::path::PathBuf;

use derive_more::Display;

use crate::Hash;

/// Permission bits that must all be set for content to be stored as
/// executable.
const EXECUTE_BITS: u32 = 0o111;

#[derive(Display, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    #[display("exec")]
    Exec,
    #[display("nonexec")]
    NonExec,
    #[display("index")]
    Index,
}

impl FileType {
    /// Suffix appended to the digest-derived file name.
    pub const fn suffix(&self) -> &'static str {
        match self {
            FileType::Exec => "-exec",
            FileType::NonExec => "",
            FileType::Index => "-index.json",
        }
    }

    /// Permission bits the store writes content of this type with.
    pub const fn store_mode(&self) -> u32 {
        match self {
            FileType::Exec => 0o755,
            FileType::NonExec | FileType::Index => 0o644,
        }
    }
}

/// Executable iff owner, group and other execute bits are all set.
pub fn file_type_from_mode(mode: u32) -> FileType {
    if mode & EXECUTE_BITS == EXECUTE_BITS {
        FileType::Exec
    } else {
        FileType::NonExec
    }
}

/// Shards on the first two characters of `hex`.
pub fn content_path_from_hex(file_type: FileType, hex: &str) -> PathBuf {
    let (shard, rest) = hex
        .char_indices()
        .nth(2)
        .map_or((hex, ""), |(at, _)| hex.split_at(at));
    let mut path = PathBuf::from(shard);
    path.push(format!("{rest}{}", file_type.suffix()));
    path
}

pub fn content_path(file_type: FileType, hash: &Hash) -> PathBuf {
    content_path_from_hex(file_type, &hash.to_hex())
}
