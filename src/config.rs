//! Persisted viewer settings.
//!
//! Stored as TOML. The file is optional; a missing file means defaults.
//!
//! Location, in priority order:
//! 1. `$RANDVIEW_CONFIG`
//! 2. `<platform config dir>/randview/config.toml`

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::{MAX_CAPACITY, MIN_CAPACITY};

pub const DEFAULT_API_URL: &str = "https://picsum.photos/1280/800";
pub const DEFAULT_CACHE_SIZE: usize = 5;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub api_url: String,
    pub max_cache_size: usize,
    pub download_dir: PathBuf,
    pub theme: Theme,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            max_cache_size: DEFAULT_CACHE_SIZE,
            download_dir: default_download_dir(),
            theme: Theme::default(),
        }
    }
}

/// Values `sanitize` had to replace.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ConfigFixes {
    pub cache_size_clamped: bool,
    pub download_dir_reset: bool,
}

impl ConfigFixes {
    pub fn any(&self) -> bool {
        self.cache_size_clamped || self.download_dir_reset
    }
}

impl ViewerConfig {
    /// Load from the default location, falling back to defaults if absent.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::info!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        log::info!("Loading config from {}", path.display());
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let text = toml::to_string_pretty(self)?;
        std::fs::write(path, text).map_err(io_err)?;
        log::info!("Saved config to {}", path.display());
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("RANDVIEW_CONFIG") {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("randview")
            .join("config.toml")
    }

    /// Bring out-of-range values back to something usable.
    pub fn sanitize(&mut self) -> ConfigFixes {
        let mut fixes = ConfigFixes::default();

        let clamped = self.max_cache_size.clamp(MIN_CAPACITY, MAX_CAPACITY);
        if clamped != self.max_cache_size {
            log::warn!(
                "max_cache_size {} out of range, using {}",
                self.max_cache_size,
                clamped
            );
            self.max_cache_size = clamped;
            fixes.cache_size_clamped = true;
        }

        if !self.download_dir.is_dir() {
            let fallback = default_download_dir();
            log::warn!(
                "download_dir {} is not a directory, using {}",
                self.download_dir.display(),
                fallback.display()
            );
            self.download_dir = fallback;
            fixes.download_dir_reset = true;
        }

        fixes
    }
}

/// The platform pictures directory, or the best approximation of one.
pub fn default_download_dir() -> PathBuf {
    dirs::picture_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join("Pictures")))
        .unwrap_or_else(|| PathBuf::from("."))
}
