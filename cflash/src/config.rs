use crate::error::Result;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_PATH: &str = "cflash.toml";
const PATH_VAR: &str = "CFLASH_CONFIG";

/// Board addresses and output settings, read from `cflash.toml`.
///
/// TOML accepts hex integers, so addresses can be written as `0xA00000`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Base of the board's control register. The board sits wherever
    /// autoconfig placed it, so there is no default.
    pub control: Option<u32>,
    pub flash_base: u32,
    pub kickstart_rom: u32,
    pub ide_base: Option<u32>,
    pub progress: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            control: None,
            flash_base: 0xA0_0000,
            kickstart_rom: 0xF8_0000,
            ide_base: None,
            progress: true,
        }
    }
}

impl Config {
    /// Loads the config file, falling back to defaults when it is missing
    /// or malformed.
    pub fn load() -> Self {
        let path = env::var_os(PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PATH));
        if !path.exists() {
            return Config::default();
        }
        match Config::from_path(&path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Ignoring {}: {}", path.display(), e);
                Config::default()
            }
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read(path)?;
        Ok(toml::from_slice(&data)?)
    }
}
