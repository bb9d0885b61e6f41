// SPDX-FileCopyrightText: 2026 pkgstore contributors
// SPDX-License-Identifier: MIT

mod cli;
mod commands;
mod error;

use std::process::ExitCode;

use clap::Parser as _;
use pkgstore_cafs::Store;
use pkgstore_cafs::config::Config;
use pkgstore_store_core::PackageId;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() -> Result<ExitCode, CliError> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    if let Some(store_dir) = cli.store_dir {
        config.store_dir = store_dir;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    debug!(store = %config.store_dir.display(), algorithm = %config.algorithm, "opening store");
    let store = Store::from_config(&config);

    match cli.command {
        Command::Add {
            tarball,
            integrity,
            name,
            version,
        } => commands::add(&store, &tarball, integrity, PackageId { name, version }).await,
        Command::Verify { index } => commands::verify(&store, &index).await,
        Command::Check { integrity, file } => commands::check(&integrity, &file).await,
        Command::Path {
            integrity,
            mode,
            index,
        } => {
            let path = commands::content_path(&store, &integrity, mode, index)?;
            println!("{}", path.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}
