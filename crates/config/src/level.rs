use serde::{Deserialize, Serialize};
use std::fmt;

/// The level a setting value was read from or written at.
///
/// Ordered from most to least specific. Only `Device` is produced by the
/// handlers in this crate; the others exist so watchers see the same ladder
/// the rest of the client uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SettingLevel {
    Device,
    RoomDevice,
    RoomAccount,
    Account,
    Room,
    Config,
    Default,
}

impl SettingLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingLevel::Device => "device",
            SettingLevel::RoomDevice => "room-device",
            SettingLevel::RoomAccount => "room-account",
            SettingLevel::Account => "account",
            SettingLevel::Room => "room",
            SettingLevel::Config => "config",
            SettingLevel::Default => "default",
        }
    }
}

impl fmt::Display for SettingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
