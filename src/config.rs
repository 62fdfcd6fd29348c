//! Server configuration
//!
//! Resolution order, highest first:
//! 1. Command-line flag (or its `SONG_CATALOG_*` environment variable)
//! 2. TOML config file given with `--config`
//! 3. Compiled defaults

use crate::executor::worker::DownloaderConfig;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const DEFAULT_BIND: &str = "0.0.0.0:8085";
pub const DEFAULT_DATABASE: &str = "music_database.bin";
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_MEDIA_DIR: &str = "songs";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Address the command listener binds to.
    pub bind: SocketAddr,
    /// Catalog file.
    pub database: PathBuf,
    /// Size of the download worker pool.
    pub workers: usize,
    /// Directory the downloader writes media into.
    pub media_dir: PathBuf,
    pub downloader: DownloaderConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8085)),
            database: PathBuf::from(DEFAULT_DATABASE),
            workers: DEFAULT_WORKERS,
            media_dir: PathBuf::from(DEFAULT_MEDIA_DIR),
            downloader: DownloaderConfig::default(),
        }
    }
}

/// Values supplied on the command line; `None` keeps the file/default value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub bind: Option<SocketAddr>,
    pub database: Option<PathBuf>,
    pub workers: Option<usize>,
    pub media_dir: Option<PathBuf>,
    pub downloader: Option<String>,
}

impl Config {
    /// Reads `path` if given, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        Ok(config)
    }

    pub fn apply(mut self, overrides: Overrides) -> Self {
        if let Some(bind) = overrides.bind {
            self.bind = bind;
        }
        if let Some(database) = overrides.database {
            self.database = database;
        }
        if let Some(workers) = overrides.workers {
            self.workers = workers;
        }
        if let Some(media_dir) = overrides.media_dir {
            self.media_dir = media_dir;
        }
        if let Some(program) = overrides.downloader {
            self.downloader.program = program;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            bail!("workers must be at least 1");
        }
        if self.downloader.program.trim().is_empty() {
            bail!("downloader.program must not be empty");
        }
        Ok(())
    }
}
