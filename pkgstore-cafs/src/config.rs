// SPDX-FileCopyrightText: 2026 pkgstore contributors
// SPDX-License-Identifier: MIT

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use pkgstore_utils_hash::Algorithm;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable naming a TOML config file.
pub const CONFIG_ENV: &str = "PKGSTORE_CONFIG";
/// Environment variable overriding `store_dir`.
pub const STORE_DIR_ENV: &str = "PKGSTORE_STORE_DIR";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Root directory of the content-addressable store
    pub store_dir: PathBuf,

    /// Digest algorithm used to address newly written content
    pub algorithm: Algorithm,

    /// Default log filter, overridden by `RUST_LOG`
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_dir: default_store_dir(std::env::var_os("HOME")),
            algorithm: Algorithm::default(),
            log_level: "info".to_string(),
        }
    }
}

fn default_store_dir(home: Option<OsString>) -> PathBuf {
    match home {
        Some(home) if !home.is_empty() => {
            PathBuf::from(home).join(".local/share/pkgstore/store/v3")
        }
        _ => PathBuf::from("store"),
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Reads the file named by `PKGSTORE_CONFIG` (defaults otherwise) and
    /// applies `PKGSTORE_STORE_DIR`.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| std::env::var_os(key))
    }

    fn load_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let mut config = match lookup(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        if let Some(store_dir) = lookup(STORE_DIR_ENV) {
            config.store_dir = PathBuf::from(store_dir);
        }
        Ok(config)
    }
}
