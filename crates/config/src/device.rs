// Device configuration
// Loaded from ~/.config/murmur/device.toml

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::theme::ThemeDefaults;

/// Static configuration for a device: which features exist, where local
/// storage lives and the theme fallbacks.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Known feature names. Only these are stored as feature flags.
    pub features: Vec<String>,

    /// Local storage file; `None` = platform config dir
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<PathBuf>,

    /// Running a login-only view (theming disabled)
    pub login_view: bool,

    pub theme: ThemeDefaults,
}

impl DeviceConfig {
    /// Get the config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("murmur")
            .join("device.toml")
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(contents) => Self::from_toml(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(ConfigError::Io(format!("{}: {}", path.display(), e))),
        }
    }

    /// Load from `path`, falling back to defaults on any error
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            log::warn!("Using default device config: {}", e);
            Self::default()
        })
    }

    pub fn storage_path(&self) -> PathBuf {
        self.storage_path
            .clone()
            .unwrap_or_else(crate::storage::FileStorage::default_path)
    }
}
