//! Theme watcher
//!
//! Resolves the theme that should be on screen from the theme settings and
//! the OS color-scheme queries, and re-applies it whenever either changes.
//!
//! Lifecycle:
//! - `new` computes the current theme (nothing is applied yet)
//! - `start` subscribes to the three theme settings, the three media queries
//!   and the dispatcher
//! - `stop` (or drop) releases every subscription; it is idempotent

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::Value;

use crate::callbacks::ListenerId;
use crate::dispatcher::{Action, Dispatcher, DispatcherRef};
use crate::error::Result;
use crate::level::SettingLevel;
use crate::media::{MediaQuery, SystemSignals};
use crate::migration::{DARK_THEME, LIGHT_THEME, THEME_IN_USE};
use crate::settings::SettingsHandler;
use crate::theme::{
    find_custom_theme, simplify_theme, SimpleTheme, Theme, ThemeDefaults, CUSTOM_THEMES_SETTING,
    CUSTOM_THEME_PREFIX,
};
use crate::watch::WatchRef;

/// Applies a theme to whatever is rendering (stylesheets, widget chrome, ...).
pub trait ThemeApplier {
    fn set_theme(&self, theme: &str);
}

struct Resolver {
    settings: Rc<dyn SettingsHandler>,
    signals: SystemSignals,
    applier: Rc<dyn ThemeApplier>,
    defaults: ThemeDefaults,
    login_view: Cell<bool>,
    current_theme: RefCell<String>,
}

impl Resolver {
    fn theme_in_use(&self) -> Result<Theme> {
        let value = self.settings.get_value(THEME_IN_USE, None)?;
        Ok(match &value {
            Value::Null => self.defaults.theme_in_use,
            Value::String(s) => Theme::parse(s).unwrap_or_else(|| {
                log::warn!("Unrecognised theme_in_use '{}', using the light theme", s);
                Theme::Light
            }),
            other => {
                log::warn!("theme_in_use is not a string ({}), using the light theme", other);
                Theme::Light
            }
        })
    }

    fn effective_theme(&self) -> Result<String> {
        let mut mode = Theme::Light;

        // No theming on the login screens
        if !self.login_view.get() {
            mode = self.theme_in_use()?;

            if mode == Theme::System {
                if self.signals.prefer_dark.matches() {
                    mode = Theme::Dark;
                } else if self.signals.prefer_light.matches() {
                    mode = Theme::Light;
                }
            }
        }

        let (setting, fallback) = if mode == Theme::Dark {
            (DARK_THEME, &self.defaults.dark_theme)
        } else {
            (LIGHT_THEME, &self.defaults.light_theme)
        };

        Ok(match self.settings.get_value(setting, None)? {
            Value::String(theme) => theme,
            Value::Null => fallback.clone(),
            other => {
                log::warn!("{} is not a string ({}), using '{}'", setting, other, fallback);
                fallback.clone()
            }
        })
    }

    fn recheck(&self, force_theme: Option<&str>) -> Result<bool> {
        let next = match force_theme {
            Some(theme) => theme.to_string(),
            None => self.effective_theme()?,
        };

        {
            let mut current = self.current_theme.borrow_mut();
            if *current == next {
                return Ok(false);
            }
            log::info!("Theme changed: {} -> {}", current, next);
            *current = next.clone();
        }

        self.applier.set_theme(&next);
        Ok(true)
    }

    fn recheck_logged(&self, force_theme: Option<&str>) {
        if let Err(e) = self.recheck(force_theme) {
            log::error!("Failed to recheck theme: {}", e);
        }
    }
}

/// Everything acquired by `start`, released together by `stop`.
struct Subscriptions {
    setting_watches: Vec<WatchRef>,
    media_listeners: Vec<(Rc<MediaQuery>, ListenerId)>,
    dispatcher_ref: Option<DispatcherRef>,
}

pub struct ThemeWatcher {
    resolver: Rc<Resolver>,
    dispatcher: Rc<Dispatcher>,
    subscriptions: RefCell<Option<Subscriptions>>,
}

impl ThemeWatcher {
    pub fn new(
        settings: Rc<dyn SettingsHandler>,
        signals: SystemSignals,
        dispatcher: Rc<Dispatcher>,
        applier: Rc<dyn ThemeApplier>,
        defaults: ThemeDefaults,
    ) -> Result<Self> {
        let resolver = Rc::new(Resolver {
            settings,
            signals,
            applier,
            defaults,
            login_view: Cell::new(false),
            current_theme: RefCell::new(String::new()),
        });
        let initial = resolver.effective_theme()?;
        *resolver.current_theme.borrow_mut() = initial;

        Ok(Self {
            resolver,
            dispatcher,
            subscriptions: RefCell::new(None),
        })
    }

    pub fn start(&self) {
        // Never hold two sets of subscriptions
        self.stop();

        let mut subs = Subscriptions {
            setting_watches: Vec::with_capacity(3),
            media_listeners: Vec::with_capacity(3),
            dispatcher_ref: None,
        };

        for setting in [LIGHT_THEME, DARK_THEME, THEME_IN_USE] {
            let weak = Rc::downgrade(&self.resolver);
            let watch = self.resolver.settings.watch_setting(
                setting,
                None,
                Box::new(move |_: Option<&str>, _: SettingLevel, _: &Value| on_change(&weak)),
            );
            subs.setting_watches.push(watch);
        }

        for query in self.resolver.signals.all() {
            let weak = Rc::downgrade(&self.resolver);
            let id = query.add_listener(move |_| on_change(&weak));
            subs.media_listeners.push((Rc::clone(query), id));
        }

        let weak = Rc::downgrade(&self.resolver);
        subs.dispatcher_ref = Some(self.dispatcher.register(move |action| {
            let Action::RecheckTheme { force_theme } = action;
            if let Some(resolver) = weak.upgrade() {
                resolver.recheck_logged(force_theme.as_deref());
            }
        }));

        log::debug!(
            "Theme watcher started ({} setting watches, {} media listeners)",
            subs.setting_watches.len(),
            subs.media_listeners.len()
        );
        *self.subscriptions.borrow_mut() = Some(subs);
    }

    /// Release everything `start` acquired. Safe to call at any time, any
    /// number of times.
    pub fn stop(&self) {
        let Some(subs) = self.subscriptions.borrow_mut().take() else {
            return;
        };

        for (query, id) in subs.media_listeners {
            query.remove_listener(id);
        }
        for watch in subs.setting_watches {
            self.resolver.settings.unwatch_setting(watch);
        }
        if let Some(id) = subs.dispatcher_ref {
            self.dispatcher.unregister(id);
        }
        log::debug!("Theme watcher stopped");
    }

    pub fn is_started(&self) -> bool {
        self.subscriptions.borrow().is_some()
    }

    /// Re-resolve and apply the theme if it changed. Returns whether it was applied.
    ///
    /// With `force_theme` the given theme is taken verbatim and resolution is skipped.
    pub fn recheck(&self, force_theme: Option<&str>) -> Result<bool> {
        self.resolver.recheck(force_theme)
    }

    pub fn effective_theme(&self) -> Result<String> {
        self.resolver.effective_theme()
    }

    /// True if the OS reports any color-scheme preference.
    pub fn is_system_theme_supported(&self) -> bool {
        let signals = &self.resolver.signals;
        signals.prefer_dark.matches() || signals.prefer_light.matches()
    }

    /// Login screens are always shown in the light theme.
    pub fn set_login_view(&self, login_view: bool) {
        self.resolver.login_view.set(login_view);
    }

    pub fn current_theme(&self) -> String {
        self.resolver.current_theme.borrow().clone()
    }

    /// The current theme as light or dark, for consumers (widgets, stickers)
    /// that only support those two.
    pub fn current_theme_simplified(&self) -> Result<SimpleTheme> {
        let theme = self.current_theme();
        let custom_themes = if theme.starts_with(CUSTOM_THEME_PREFIX) {
            self.resolver.settings.get_value(CUSTOM_THEMES_SETTING, None)?
        } else {
            Value::Null
        };
        Ok(simplify_theme(&theme, |name| find_custom_theme(&custom_themes, name)))
    }
}

impl Drop for ThemeWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for ThemeWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThemeWatcher")
            .field("current_theme", &*self.resolver.current_theme.borrow())
            .field("login_view", &self.resolver.login_view.get())
            .field("started", &self.is_started())
            .finish()
    }
}

fn on_change(resolver: &Weak<Resolver>) {
    if let Some(resolver) = resolver.upgrade() {
        resolver.recheck_logged(None);
    }
}
