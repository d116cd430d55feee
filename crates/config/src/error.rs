use std::fmt;

/// Failures surfaced by the settings layer.
///
/// Absent or malformed stored values are not errors (they read as unset);
/// only the storage backend failing to persist or serialize ends up here.
#[derive(Debug)]
pub enum SettingsError {
    /// Storage backend I/O failure (file read/write, rename).
    Io(String),
    /// A value could not be serialized for storage.
    Serialize(String),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "storage I/O error: {msg}"),
            Self::Serialize(msg) => write!(f, "cannot serialize setting value: {msg}"),
        }
    }
}

impl std::error::Error for SettingsError {}

impl From<std::io::Error> for SettingsError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for SettingsError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialize(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SettingsError>;

/// Failures loading the device configuration file.
#[derive(Debug)]
pub enum ConfigError {
    /// The file exists but could not be read.
    Io(String),
    /// TOML parse / deserialization error.
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "config I/O error: {msg}"),
            Self::Parse(msg) => write!(f, "config parse error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}
