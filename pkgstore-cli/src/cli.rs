// SPDX-FileCopyrightText: 2026 pkgstore contributors
// SPDX-License-Identifier: MIT

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Inspect and populate a content-addressable package store
#[derive(Parser, Debug)]
#[command(name = "pkgstore")]
pub struct Cli {
    /// Store directory (overrides the config file and PKGSTORE_STORE_DIR)
    #[arg(long, global = true)]
    pub store_dir: Option<PathBuf>,

    /// TOML config file (defaults to PKGSTORE_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a package tarball to the store and write its files index
    Add {
        tarball: PathBuf,

        /// Integrity string the tarball must match, e.g. sha512-...
        #[arg(long)]
        integrity: Option<String>,

        /// Package name, used when the tarball has no package.json
        #[arg(long)]
        name: Option<String>,

        /// Package version, used when the tarball has no package.json
        #[arg(long)]
        version: Option<String>,
    },
    /// Verify that the store holds every file a files index refers to
    Verify { index: PathBuf },
    /// Check a file against an integrity string
    Check { integrity: String, file: PathBuf },
    /// Print the store path for an integrity string
    Path {
        integrity: String,

        /// Permission bits of the content, in octal
        #[arg(long, value_parser = parse_mode, conflicts_with = "index")]
        mode: Option<u32>,

        /// Print the files index location instead of a content location
        #[arg(long)]
        index: bool,
    },
}

fn parse_mode(s: &str) -> Result<u32, String> {
    let digits = s.strip_prefix("0o").unwrap_or(s);
    u32::from_str_radix(digits, 8).map_err(|e| format!("invalid octal mode '{s}': {e}"))
}
