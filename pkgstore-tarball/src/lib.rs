// SPDX-FileCopyrightText: 2026 pkgstore contributors
// SPDX-License-Identifier: MIT

//! Adding package tarballs to the content-addressable store.
//!
//! Two entry points:
//!
//! - [`add_tarball_to_store`] takes a fully downloaded tarball, checks its
//!   published integrity before extracting anything, and writes the
//!   package's files index.
//! - [`IngestOptions::ingest`] streams any [`AsyncRead`](tokio::io::AsyncRead)
//!   and, if asked, verifies the integrity of the raw stream once it has been
//!   consumed.
//!
//! Both accept plain and gzip-compressed tar. Only regular files are added;
//! directories, links and device entries are skipped.

mod add;
mod error;
mod ingest;

pub use add::{AddTarballResult, TarballRequest, add_tarball_to_store};
pub use error::TarballError;
pub use ingest::IngestOptions;
pub use pkgstore_cafs::AddToStoreResult;
