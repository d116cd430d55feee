//! Synchronous string-keyed storage for "this device".
//!
//! `LocalStorage` is the seam the settings handler persists through. Two
//! backends ship here:
//! - `MemoryStorage`: in-process map (tests, ephemeral sessions)
//! - `FileStorage`: one JSON object on disk, re-read on every access
//!
//! The free functions on top (`get_boolean`, `get_object`, ...) encode the
//! value conventions shared by every key: booleans as `"true"`/`"false"`,
//! objects as JSON text.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::Result;

/// Key holding the combined blob of device settings.
pub const SETTINGS_KEY: &str = "mx_local_settings";

/// Prefix for per-feature flag keys. Feature names already start with
/// `feature_`, so keys end up as `mx_labs_feature_feature_x`.
pub const FEATURE_KEY_PREFIX: &str = "mx_labs_feature_";

/// A synchronous, string-keyed persistent store.
pub trait LocalStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> Result<()>;
    fn remove_item(&self, key: &str) -> Result<()>;
}

/// In-memory storage. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RefCell<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }
}

impl LocalStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.borrow().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.items.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.items.borrow_mut().remove(key);
        Ok(())
    }
}

/// File-backed storage: a single JSON object mapping keys to strings.
///
/// Every call reads the file, so external edits are picked up immediately.
/// Writes go through a temp file and a rename.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default location: `~/.config/murmur/local_storage.json`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("murmur")
            .join("local_storage.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&contents) {
            Ok(items) => Ok(items),
            Err(e) => {
                log::warn!("Ignoring unreadable storage file {}: {}", self.path.display(), e);
                Ok(BTreeMap::new())
            }
        }
    }

    fn write_all(&self, items: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(items)?;
        let temp = self.path.with_extension("json.tmp");
        fs::write(&temp, json)?;
        fs::rename(&temp, &self.path)?;
        Ok(())
    }
}

impl LocalStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self.read_all()?;
        items.insert(key.to_string(), value.to_string());
        self.write_all(&items)
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let mut items = self.read_all()?;
        if items.remove(key).is_some() {
            self.write_all(&items)?;
        }
        Ok(())
    }
}

/// Read a boolean. Absent -> `None`; anything but `"true"` reads as false.
pub fn get_boolean(storage: &dyn LocalStorage, key: &str) -> Result<Option<bool>> {
    Ok(storage.get_item(key)?.map(|raw| raw == "true"))
}

/// Write a boolean. `None` removes the key so "unset" stays distinguishable
/// from "explicitly false".
pub fn set_boolean(storage: &dyn LocalStorage, key: &str, value: Option<bool>) -> Result<()> {
    match value {
        Some(v) => storage.set_item(key, if v { "true" } else { "false" }),
        None => storage.remove_item(key),
    }
}

/// Read a JSON value. Absent or unparsable -> `None`.
pub fn get_object(storage: &dyn LocalStorage, key: &str) -> Result<Option<Value>> {
    let Some(raw) = storage.get_item(key)? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            log::warn!("Stored value under '{}' is not valid JSON, treating as absent: {}", key, e);
            Ok(None)
        }
    }
}

pub fn set_object(storage: &dyn LocalStorage, key: &str, value: &Value) -> Result<()> {
    let json = serde_json::to_string(value)?;
    storage.set_item(key, &json)
}
