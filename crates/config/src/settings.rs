// Device-level settings
// Persisted in local storage under `mx_local_settings`, features under their own keys

use std::fmt;
use std::rc::Rc;

use serde_json::{Map, Value};

use crate::error::Result;
use crate::level::SettingLevel;
use crate::migration::{
    self, boolean_alias, is_theme_setting, is_truthy, DARK_THEME, LAYOUT, LIGHT_THEME,
    THEME_IN_USE,
};
use crate::storage::{
    get_boolean, get_object, set_boolean, set_object, LocalStorage, FEATURE_KEY_PREFIX,
    SETTINGS_KEY,
};
use crate::watch::{WatchManager, WatchRef};

/// Boxed watcher callback accepted through the `SettingsHandler` seam.
pub type BoxedWatchCallback = Box<dyn FnMut(Option<&str>, SettingLevel, &Value)>;

/// Reads and writes settings at one level.
///
/// Values are `serde_json::Value`; `Value::Null` means the level has no value.
pub trait SettingsHandler {
    fn get_value(&self, setting: &str, room_id: Option<&str>) -> Result<Value>;

    /// Persist a value. Watchers are notified only after the write commits.
    fn set_value(&self, setting: &str, room_id: Option<&str>, value: Value) -> Result<()>;

    fn can_set_value(&self, setting: &str, room_id: Option<&str>) -> bool;

    fn watch_setting(
        &self,
        setting: &str,
        room_id: Option<&str>,
        callback: BoxedWatchCallback,
    ) -> WatchRef;

    fn unwatch_setting(&self, watch_ref: WatchRef);
}

/// Settings for the current device.
///
/// Room ids are accepted but ignored: a device value applies everywhere.
/// Features and a few notification toggles live outside the settings blob
/// under legacy keys; everything else is a field of the blob.
pub struct DeviceSettingsHandler {
    feature_names: Vec<String>,
    storage: Rc<dyn LocalStorage>,
    watchers: Rc<WatchManager>,
}

impl DeviceSettingsHandler {
    pub fn new(
        feature_names: Vec<String>,
        storage: Rc<dyn LocalStorage>,
        watchers: Rc<WatchManager>,
    ) -> Self {
        Self {
            feature_names,
            storage,
            watchers,
        }
    }

    pub fn watchers(&self) -> &Rc<WatchManager> {
        &self.watchers
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn is_feature(&self, setting: &str) -> bool {
        self.feature_names.iter().any(|f| f == setting)
    }

    /// Tri-state feature flag: `None` when never set, so "unset" and
    /// "explicitly disabled" stay distinct.
    pub fn read_feature(&self, feature: &str) -> Result<Option<bool>> {
        get_boolean(self.storage.as_ref(), &feature_key(feature))
    }

    fn write_feature(&self, feature: &str, value: Value) -> Result<()> {
        set_boolean(self.storage.as_ref(), &feature_key(feature), as_flag(feature, &value))?;
        self.notify(feature, &value);
        Ok(())
    }

    /// The settings blob. Missing, unparsable or non-object data reads as empty.
    fn settings(&self) -> Result<Map<String, Value>> {
        match get_object(self.storage.as_ref(), SETTINGS_KEY)? {
            Some(Value::Object(map)) => Ok(map),
            Some(other) => {
                log::warn!("Settings blob is not an object ({}), starting fresh", other);
                Ok(Map::new())
            }
            None => Ok(Map::new()),
        }
    }

    /// Replace the whole blob in one write and return it for notification.
    fn save_settings(&self, blob: Map<String, Value>) -> Result<Value> {
        let blob = Value::Object(blob);
        set_object(self.storage.as_ref(), SETTINGS_KEY, &blob)?;
        Ok(blob)
    }

    fn notify(&self, setting: &str, value: &Value) {
        self.watchers
            .notify_update(setting, None, SettingLevel::Device, value);
    }
}

impl SettingsHandler for DeviceSettingsHandler {
    fn get_value(&self, setting: &str, _room_id: Option<&str>) -> Result<Value> {
        if self.is_feature(setting) {
            return Ok(self.read_feature(setting)?.map_or(Value::Null, Value::Bool));
        }

        if let Some(key) = boolean_alias(setting) {
            return Ok(get_boolean(self.storage.as_ref(), key)?.map_or(Value::Null, Value::Bool));
        }

        let blob = self.settings()?;
        Ok(match setting {
            THEME_IN_USE => migration::read_theme_in_use(&blob),
            LIGHT_THEME | DARK_THEME => migration::read_mode_theme(&blob, setting),
            _ => blob.get(setting).cloned().unwrap_or(Value::Null),
        })
    }

    fn set_value(&self, setting: &str, _room_id: Option<&str>, value: Value) -> Result<()> {
        log::debug!("Setting device value '{}' = {}", setting, value);

        if self.is_feature(setting) {
            return self.write_feature(setting, value);
        }

        if let Some(key) = boolean_alias(setting) {
            set_boolean(self.storage.as_ref(), key, as_flag(setting, &value))?;
            self.notify(setting, &value);
            return Ok(());
        }

        let mut blob = self.settings()?;

        if setting == LAYOUT {
            migration::strip_legacy_layout(&mut blob);
            blob.insert(setting.to_string(), value.clone());
            self.save_settings(blob)?;
            self.notify(setting, &value);
            return Ok(());
        }

        if is_theme_setting(setting) {
            migration::migrate_theme_fields(&mut blob, setting);
            blob.insert(setting.to_string(), value);
            let saved = self.save_settings(blob)?;

            // The migration may have rewritten the siblings, so all three report
            for name in [THEME_IN_USE, LIGHT_THEME, DARK_THEME] {
                self.notify(name, saved.get(name).unwrap_or(&Value::Null));
            }
            return Ok(());
        }

        blob.insert(setting.to_string(), value.clone());
        self.save_settings(blob)?;
        self.notify(setting, &value);
        Ok(())
    }

    fn can_set_value(&self, _setting: &str, _room_id: Option<&str>) -> bool {
        true // It's their device
    }

    fn watch_setting(
        &self,
        setting: &str,
        room_id: Option<&str>,
        callback: BoxedWatchCallback,
    ) -> WatchRef {
        self.watchers.watch_setting(setting, room_id, callback)
    }

    fn unwatch_setting(&self, watch_ref: WatchRef) {
        self.watchers.unwatch_setting(watch_ref);
    }
}

impl fmt::Debug for DeviceSettingsHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceSettingsHandler")
            .field("feature_names", &self.feature_names)
            .field("watchers", &self.watchers)
            .finish_non_exhaustive()
    }
}

fn feature_key(feature: &str) -> String {
    format!("{FEATURE_KEY_PREFIX}{feature}")
}

/// Interpret a value written to a boolean-backed setting.
fn as_flag(setting: &str, value: &Value) -> Option<bool> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(*b),
        other => {
            log::debug!("Coercing non-boolean {} for '{}'", other, setting);
            Some(is_truthy(other))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use serde_json::json;
    use std::cell::RefCell;

    fn handler(features: &[&str]) -> (DeviceSettingsHandler, Rc<MemoryStorage>) {
        let storage = Rc::new(MemoryStorage::new());
        let handler = DeviceSettingsHandler::new(
            features.iter().map(|f| f.to_string()).collect(),
            storage.clone(),
            Rc::new(WatchManager::new()),
        );
        (handler, storage)
    }

    fn seed(storage: &MemoryStorage, blob: Value) {
        storage.set_item(SETTINGS_KEY, &blob.to_string()).unwrap();
    }

    fn stored_blob(storage: &MemoryStorage) -> Value {
        serde_json::from_str(&storage.get_item(SETTINGS_KEY).unwrap().unwrap()).unwrap()
    }

    #[test]
    fn test_feature_tristate() {
        let (h, storage) = handler(&["feature_threads"]);
        assert!(h.is_feature("feature_threads"));
        assert_eq!(h.get_value("feature_threads", None).unwrap(), Value::Null);

        h.set_value("feature_threads", None, json!(false)).unwrap();
        assert_eq!(h.get_value("feature_threads", None).unwrap(), json!(false));
        assert_eq!(
            storage.get_item("mx_labs_feature_feature_threads").unwrap().as_deref(),
            Some("false")
        );

        h.set_value("feature_threads", None, Value::Null).unwrap();
        assert_eq!(h.read_feature("feature_threads").unwrap(), None);
        // Features never touch the blob
        assert_eq!(storage.get_item(SETTINGS_KEY).unwrap(), None);
    }

    #[test]
    fn test_notification_aliases_use_legacy_keys() {
        let (h, storage) = handler(&[]);
        storage.set_item("notifications_body_enabled", "false").unwrap();
        assert_eq!(h.get_value("notificationBodyEnabled", None).unwrap(), json!(false));
        assert_eq!(h.get_value("notificationsEnabled", None).unwrap(), Value::Null);

        h.set_value("audioNotificationsEnabled", None, json!(true)).unwrap();
        assert_eq!(storage.get_item("audio_notifications_enabled").unwrap().as_deref(), Some("true"));
        assert_eq!(storage.get_item(SETTINGS_KEY).unwrap(), None);
    }

    #[test]
    fn test_plain_setting_roundtrip() {
        let (h, storage) = handler(&[]);
        assert_eq!(h.get_value("soundPack", None).unwrap(), Value::Null);

        h.set_value("soundPack", Some("!room:example.org"), json!("classic")).unwrap();
        h.set_value("fontSize", None, json!(14)).unwrap();

        assert_eq!(h.get_value("soundPack", None).unwrap(), json!("classic"));
        assert_eq!(stored_blob(&storage), json!({"soundPack": "classic", "fontSize": 14}));
    }

    #[test]
    fn test_theme_in_use_reads_legacy_system_flag() {
        let (h, storage) = handler(&[]);
        seed(&storage, json!({"use_system_theme": true, "theme_in_use": "dark"}));
        assert_eq!(h.get_value("theme_in_use", None).unwrap(), json!("system"));

        seed(&storage, json!({"theme_in_use": "dark"}));
        assert_eq!(h.get_value("theme_in_use", None).unwrap(), json!("dark"));
    }

    #[test]
    fn test_corrupt_blob_reads_as_empty() {
        let (h, storage) = handler(&[]);
        storage.set_item(SETTINGS_KEY, "not json").unwrap();
        assert_eq!(h.get_value("layout", None).unwrap(), Value::Null);

        // and the next write starts a fresh blob
        h.set_value("layout", None, json!("group")).unwrap();
        assert_eq!(stored_blob(&storage), json!({"layout": "group"}));
    }

    #[test]
    fn test_notifications_fire_after_commit() {
        let (h, storage) = handler(&[]);
        let h = Rc::new(h);
        let observed = Rc::new(RefCell::new(Vec::new()));

        let storage_in_cb = Rc::clone(&storage);
        let observed_in_cb = Rc::clone(&observed);
        h.watch_setting(
            "layout",
            None,
            Box::new(move |_: Option<&str>, _: SettingLevel, _: &Value| {
                observed_in_cb.borrow_mut().push(stored_blob(&storage_in_cb));
            }),
        );

        h.set_value("layout", None, json!("irc")).unwrap();
        assert_eq!(*observed.borrow(), vec![json!({"layout": "irc"})]);
    }

    #[test]
    fn test_can_always_set() {
        let (h, _) = handler(&["feature_x"]);
        assert!(h.can_set_value("feature_x", None));
        assert!(h.can_set_value("anything", Some("!r")));
    }
}
