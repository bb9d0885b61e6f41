// SPDX-FileCopyrightText: 2026 pkgstore contributors
// SPDX-License-Identifier: MIT

//! Test utilities for pkgstore.
//!
//! Temporary store directories and in-memory tarball fixtures.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use tar::{EntryType, Header};
use tempfile::TempDir;

/// A wrapper around TempDir that provides a canonicalized path.
/// This resolves symlinks like /var -> /private/var on macOS, so paths
/// handed out by the store compare equal to paths built in tests.
pub struct CanonicalTempDir {
    _inner: TempDir,
    path: PathBuf,
}

impl CanonicalTempDir {
    /// Create a new temporary directory with a canonicalized path.
    pub fn new() -> std::io::Result<Self> {
        let inner = TempDir::new()?;
        let path = inner.path().canonicalize()?;
        Ok(Self {
            _inner: inner,
            path,
        })
    }

    /// Get the canonicalized path to the temporary directory.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

enum FixtureEntry {
    File {
        path: String,
        contents: Vec<u8>,
        mode: u32,
    },
    Dir {
        path: String,
    },
    Symlink {
        path: String,
        target: String,
    },
    /// Written into the header verbatim so paths the `tar` crate refuses
    /// (absolute, `..`) can be produced.
    Raw {
        name: Vec<u8>,
        contents: Vec<u8>,
    },
}

/// Builds package tarballs in memory.
///
/// ```
/// use pkgstore_utils_test::TarballFixture;
///
/// let tgz = TarballFixture::new()
///     .file("package.json", r#"{"name":"a","version":"1.0.0"}"#, 0o644)
///     .file("bin/cli.js", "#!/usr/bin/env node", 0o755)
///     .tar_gz();
/// assert_eq!(&tgz[..2], &[0x1f, 0x8b]);
/// ```
#[derive(Default)]
pub struct TarballFixture {
    entries: Vec<FixtureEntry>,
}

impl TarballFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, path: &str, contents: impl Into<Vec<u8>>, mode: u32) -> Self {
        self.entries.push(FixtureEntry::File {
            path: path.to_owned(),
            contents: contents.into(),
            mode,
        });
        self
    }

    pub fn dir(mut self, path: &str) -> Self {
        self.entries.push(FixtureEntry::Dir {
            path: path.to_owned(),
        });
        self
    }

    pub fn symlink(mut self, path: &str, target: &str) -> Self {
        self.entries.push(FixtureEntry::Symlink {
            path: path.to_owned(),
            target: target.to_owned(),
        });
        self
    }

    /// A regular file whose header name is stored unvalidated.
    pub fn raw_file(mut self, name: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.entries.push(FixtureEntry::Raw {
            name: name.as_bytes().to_vec(),
            contents: contents.into(),
        });
        self
    }

    /// Uncompressed tar bytes.
    pub fn tar(&self) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for entry in &self.entries {
            let mut header = Header::new_gnu();
            header.set_mtime(0);
            header.set_uid(0);
            header.set_gid(0);
            match entry {
                FixtureEntry::File {
                    path,
                    contents,
                    mode,
                } => {
                    header.set_entry_type(EntryType::Regular);
                    header.set_mode(*mode);
                    header.set_size(contents.len() as u64);
                    builder
                        .append_data(&mut header, path, contents.as_slice())
                        .expect("append file");
                }
                FixtureEntry::Dir { path } => {
                    header.set_entry_type(EntryType::Directory);
                    header.set_mode(0o755);
                    header.set_size(0);
                    builder
                        .append_data(&mut header, path, std::io::empty())
                        .expect("append directory");
                }
                FixtureEntry::Symlink { path, target } => {
                    header.set_entry_type(EntryType::Symlink);
                    header.set_mode(0o777);
                    header.set_size(0);
                    builder
                        .append_link(&mut header, path, target)
                        .expect("append symlink");
                }
                FixtureEntry::Raw { name, contents } => {
                    header.set_entry_type(EntryType::Regular);
                    header.set_mode(0o644);
                    header.set_size(contents.len() as u64);
                    let field = &mut header.as_old_mut().name;
                    assert!(name.len() < field.len(), "raw name too long");
                    field[..name.len()].copy_from_slice(name);
                    header.set_cksum();
                    builder
                        .append(&header, contents.as_slice())
                        .expect("append raw file");
                }
            }
        }
        builder.into_inner().expect("finish tarball")
    }

    /// Gzip-compressed tar bytes.
    pub fn tar_gz(&self) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&self.tar()).expect("compress tarball");
        encoder.finish().expect("finish gzip stream")
    }
}
