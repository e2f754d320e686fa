// Copyright 2026 Magic Mount Daemon Authors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Layered configuration: defaults, overridden by a config file, overridden by CLI flags.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::defs;

pub const CONFIG_FILE_DEFAULT: &str = defs::CONFIG_FILE_DEFAULT;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root the live filesystem is resolved against. `/` in production;
    /// overridden to a temp dir by tests so sentinel/overlay paths never
    /// touch the real `/system`, `/cache`, or `/dev`.
    pub root: PathBuf,
    pub mountpoint: PathBuf,
    pub mirrdir: PathBuf,
    pub dummdir: PathBuf,
    pub cachemount: PathBuf,
    pub coredir: PathBuf,
    pub cache_img: PathBuf,
    pub data_merge_img: PathBuf,
    pub active_img: PathBuf,
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/"),
            mountpoint: PathBuf::from(defs::MOUNTPOINT),
            mirrdir: PathBuf::from(defs::MIRRDIR),
            dummdir: PathBuf::from(defs::DUMMDIR),
            cachemount: PathBuf::from(defs::CACHEMOUNT),
            coredir: PathBuf::from(defs::COREDIR),
            cache_img: PathBuf::from(defs::CACHE_IMG),
            data_merge_img: PathBuf::from(defs::DATA_MERGE_IMG),
            active_img: PathBuf::from(defs::ACTIVE_IMG),
            verbose: false,
        }
    }
}

impl Config {
    /// Joins an absolute sentinel path (e.g. [`defs::UNBLOCKFILE`]) onto
    /// `root`.
    pub fn resolve(&self, absolute: &str) -> PathBuf {
        self.root.join(absolute.trim_start_matches('/'))
    }


    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn load_default() -> Result<Self> {
        Self::from_file(Path::new(CONFIG_FILE_DEFAULT))
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn merge_with_cli(&mut self, verbose: bool) {
        if verbose {
            self.verbose = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_toml() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(config.mountpoint, parsed.mountpoint);
        assert_eq!(config.verbose, parsed.verbose);
    }
}
