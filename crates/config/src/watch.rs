//! Setting watchers
//!
//! Subscriptions are keyed by setting name and (optionally) room. Handlers
//! call `notify_update` after a write has been committed; delivery is
//! synchronous and in registration order.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::callbacks::invoke_guarded;
use crate::level::SettingLevel;

/// Watcher callback: `(room_id, level, new_value)`.
pub type WatchCallback = dyn FnMut(Option<&str>, SettingLevel, &Value);

/// Opaque handle for an active watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchRef(u64);

impl fmt::Display for WatchRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "watch#{}", self.0)
    }
}

struct Watcher {
    id: WatchRef,
    setting: String,
    room_id: Option<String>,
    callback: Rc<RefCell<WatchCallback>>,
}

impl Watcher {
    /// A device-wide update (no room) reaches every watcher of the setting;
    /// a room update reaches that room's watchers and the room-less ones.
    fn wants(&self, setting: &str, room_id: Option<&str>) -> bool {
        if self.setting != setting {
            return false;
        }
        match room_id {
            None => true,
            Some(room) => self.room_id.is_none() || self.room_id.as_deref() == Some(room),
        }
    }
}

#[derive(Default)]
pub struct WatchManager {
    next_id: Cell<u64>,
    watchers: RefCell<Vec<Watcher>>,
}

impl WatchManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn watch_setting(
        &self,
        setting: &str,
        room_id: Option<&str>,
        callback: impl FnMut(Option<&str>, SettingLevel, &Value) + 'static,
    ) -> WatchRef {
        let id = WatchRef(self.next_id.get() + 1);
        self.next_id.set(id.0);
        self.watchers.borrow_mut().push(Watcher {
            id,
            setting: setting.to_string(),
            room_id: room_id.map(str::to_string),
            callback: Rc::new(RefCell::new(callback)),
        });
        log::debug!("{} watching '{}' (room: {:?})", id, setting, room_id);
        id
    }

    /// Remove a watch. Unknown or already-removed refs are ignored.
    pub fn unwatch_setting(&self, watch_ref: WatchRef) -> bool {
        let mut watchers = self.watchers.borrow_mut();
        let before = watchers.len();
        watchers.retain(|w| w.id != watch_ref);
        watchers.len() != before
    }

    pub fn is_watching(&self, watch_ref: WatchRef) -> bool {
        self.watchers.borrow().iter().any(|w| w.id == watch_ref)
    }

    /// Number of active watches on a setting, across all rooms.
    pub fn watcher_count(&self, setting: &str) -> usize {
        self.watchers.borrow().iter().filter(|w| w.setting == setting).count()
    }

    pub fn notify_update(
        &self,
        setting: &str,
        room_id: Option<&str>,
        level: SettingLevel,
        new_value: &Value,
    ) {
        // Snapshot first: callbacks are free to (un)watch while we iterate
        let targets: Vec<(WatchRef, Rc<RefCell<WatchCallback>>)> = self
            .watchers
            .borrow()
            .iter()
            .filter(|w| w.wants(setting, room_id))
            .map(|w| (w.id, Rc::clone(&w.callback)))
            .collect();

        if targets.is_empty() {
            return;
        }
        log::debug!(
            "Notifying {} watcher(s) of '{}' at {}: {}",
            targets.len(),
            setting,
            level,
            new_value
        );

        for (id, callback) in targets {
            if !self.is_watching(id) {
                continue;
            }
            invoke_guarded(&*callback, id, |f| f(room_id, level, new_value));
        }
    }
}

impl fmt::Debug for WatchManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchManager")
            .field("watchers", &self.watchers.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    type Log = Rc<RefCell<Vec<(String, Value)>>>;

    fn recorder(log: &Log, tag: &str) -> impl FnMut(Option<&str>, SettingLevel, &Value) + 'static {
        let log = Rc::clone(log);
        let tag = tag.to_string();
        move |_: Option<&str>, _: SettingLevel, v: &Value| {
            log.borrow_mut().push((tag.clone(), v.clone()))
        }
    }

    #[test]
    fn test_only_subscribed_setting_fires() {
        let manager = WatchManager::new();
        let log: Log = Rc::default();
        manager.watch_setting("layout", None, recorder(&log, "layout"));
        manager.watch_setting("soundPack", None, recorder(&log, "sound"));

        manager.notify_update("layout", None, SettingLevel::Device, &json!("bubble"));

        assert_eq!(*log.borrow(), vec![("layout".to_string(), json!("bubble"))]);
    }

    #[test]
    fn test_room_scoping() {
        let manager = WatchManager::new();
        let log: Log = Rc::default();
        manager.watch_setting("s", Some("!a"), recorder(&log, "a"));
        manager.watch_setting("s", Some("!b"), recorder(&log, "b"));
        manager.watch_setting("s", None, recorder(&log, "any"));

        manager.notify_update("s", Some("!a"), SettingLevel::RoomDevice, &json!(1));
        let tags: Vec<_> = log.borrow().iter().map(|(t, _)| t.clone()).collect();
        assert_eq!(tags, vec!["a", "any"]);

        log.borrow_mut().clear();
        manager.notify_update("s", None, SettingLevel::Device, &json!(2));
        let tags: Vec<_> = log.borrow().iter().map(|(t, _)| t.clone()).collect();
        assert_eq!(tags, vec!["a", "b", "any"]);
    }

    #[test]
    fn test_unwatch_stops_delivery() {
        let manager = WatchManager::new();
        let log: Log = Rc::default();
        let watch = manager.watch_setting("s", None, recorder(&log, "x"));

        assert!(manager.unwatch_setting(watch));
        assert!(!manager.unwatch_setting(watch));
        manager.notify_update("s", None, SettingLevel::Device, &json!(true));

        assert!(log.borrow().is_empty());
        assert_eq!(manager.watcher_count("s"), 0);
    }

    #[test]
    fn test_unwatch_during_notify_skips_removed() {
        let manager = Rc::new(WatchManager::new());
        let log: Log = Rc::default();
        let second: Rc<Cell<Option<WatchRef>>> = Rc::default();

        let m = Rc::clone(&manager);
        let s = Rc::clone(&second);
        manager.watch_setting("s", None, move |_, _, _| {
            if let Some(watch) = s.get() {
                m.unwatch_setting(watch);
            }
        });
        second.set(Some(manager.watch_setting("s", None, recorder(&log, "second"))));

        manager.notify_update("s", None, SettingLevel::Device, &json!("v"));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_watch_refs_are_unique() {
        let manager = WatchManager::new();
        let a = manager.watch_setting("s", None, |_, _, _| {});
        let b = manager.watch_setting("s", None, |_, _, _| {});
        assert_ne!(a, b);
        assert_eq!(a.to_string(), "watch#1");
    }
}
