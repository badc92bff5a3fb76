//! JSON file adapter for [`ConfigPort`].
//!
//! Stores [`ServoConfig`] as pretty-printed JSON. On the Pi this is a file
//! under `/etc`; on the ESP32 it works against any VFS mount (SPIFFS,
//! FAT). Missing fields fall back to defaults via `#[serde(default)]`, so
//! older files keep loading after new settings are added.
//!
//! # Security
//!
//! Configuration is validated on both load and save. A file that widens
//! the mechanical limits into nonsense is rejected rather than clamped.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::ServoConfig;

/// Default location on the Linux build.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/apis/servo.json";

/// File-backed configuration store.
#[derive(Debug, Clone)]
pub struct JsonConfigStore {
    path: PathBuf,
}

impl JsonConfigStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigPort for JsonConfigStore {
    fn load(&self) -> Result<ServoConfig, ConfigError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("config: {} not found, using defaults", self.path.display());
                return Ok(ServoConfig::default());
            }
            Err(e) => {
                warn!("config: read {} failed: {}", self.path.display(), e);
                return Err(ConfigError::IoError);
            }
        };

        let config: ServoConfig = serde_json::from_slice(&bytes).map_err(|e| {
            warn!("config: {} is not valid JSON: {}", self.path.display(), e);
            ConfigError::Corrupted
        })?;
        config.validate()?;
        info!("config: loaded {}", self.path.display());
        Ok(config)
    }

    fn save(&self, config: &ServoConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let json = serde_json::to_vec_pretty(config).map_err(|_| ConfigError::IoError)?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| {
                warn!("config: create {} failed: {}", dir.display(), e);
                ConfigError::IoError
            })?;
        }
        fs::write(&self.path, json).map_err(|e| {
            warn!("config: write {} failed: {}", self.path.display(), e);
            ConfigError::IoError
        })?;
        info!("config: saved {}", self.path.display());
        Ok(())
    }
}
