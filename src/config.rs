//! Daemon configuration
//!
//! Loaded from a TOML file; a missing file means defaults, never an error.
//! Every key is optional.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use crate::error::DaemonError;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/kbattachd.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Control character device shared with the keyboard MCU
    pub device_path: PathBuf,
    /// Presence-indicator path used when registry discovery finds nothing
    pub fallback_input_path: PathBuf,
    /// Persisted angle-detection flag (single-character file)
    pub pref_path: PathBuf,
    pub watchdog_enabled: bool,
    /// Angle-detection state until the preference file says otherwise
    pub angle_detection_default: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_path: PathBuf::from("/dev/nanodev0"),
            fallback_input_path: PathBuf::from("/dev/input/event12"),
            pref_path: PathBuf::from("/var/lib/kbattachd/angle_detection"),
            watchdog_enabled: true,
            angle_detection_default: true,
        }
    }
}

/// Load configuration from `path`, or [`DEFAULT_CONFIG_PATH`] when `None`.
pub fn load(path: Option<&Path>) -> Result<Config, DaemonError> {
    let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("no configuration at {}, using defaults", path.display());
            return Ok(Config::default());
        }
        Err(e) => return Err(e.into()),
    };

    let config: Config = toml::from_str(&text).map_err(|e| DaemonError::Config(e.to_string()))?;
    info!("configuration loaded from {}", path.display());
    Ok(config)
}
