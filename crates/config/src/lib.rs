// Device settings: persisted values, watchers, theme resolution

pub mod callbacks;
pub mod device;
pub mod dispatcher;
pub mod error;
pub mod level;
pub mod media;
pub mod migration;
pub mod settings;
pub mod storage;
pub mod theme;
pub mod theme_watcher;
pub mod watch;

pub use device::DeviceConfig;
pub use dispatcher::{Action, Dispatcher};
pub use error::{ConfigError, Result, SettingsError};
pub use level::SettingLevel;
pub use media::{MediaQuery, SystemSignals};
pub use settings::{DeviceSettingsHandler, SettingsHandler};
pub use storage::{FileStorage, LocalStorage, MemoryStorage};
pub use theme::{SimpleTheme, Theme, ThemeDefaults};
pub use theme_watcher::{ThemeApplier, ThemeWatcher};
pub use watch::{WatchManager, WatchRef};
