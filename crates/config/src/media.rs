//! OS media-query signals
//!
//! The host environment owns the real media queries; it mirrors each one
//! into a `MediaQuery` and calls `set_matches` when the OS reports a change.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::callbacks::{CallbackList, ListenerId};

pub const PREFERS_DARK: &str = "(prefers-color-scheme: dark)";
pub const PREFERS_LIGHT: &str = "(prefers-color-scheme: light)";
pub const PREFERS_HIGH_CONTRAST: &str = "(prefers-contrast: more)";

/// A boolean media query with change listeners.
pub struct MediaQuery {
    query: String,
    matches: Cell<bool>,
    listeners: CallbackList<bool>,
}

impl MediaQuery {
    pub fn new(query: impl Into<String>, matches: bool) -> Self {
        Self {
            query: query.into(),
            matches: Cell::new(matches),
            listeners: CallbackList::new(),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn matches(&self) -> bool {
        self.matches.get()
    }

    /// Update from the host. Listeners only hear about actual changes.
    pub fn set_matches(&self, matches: bool) {
        if self.matches.replace(matches) == matches {
            return;
        }
        log::debug!("Media query {} now {}", self.query, matches);
        self.listeners.emit(&matches);
    }

    pub fn add_listener(&self, listener: impl FnMut(&bool) + 'static) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl fmt::Debug for MediaQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaQuery")
            .field("query", &self.query)
            .field("matches", &self.matches.get())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// The OS signals the theme watcher follows.
///
/// Dark and light are separate queries: each may or may not match, which
/// gives the tristate dark / light / no preference reported.
#[derive(Debug, Clone)]
pub struct SystemSignals {
    pub prefer_dark: Rc<MediaQuery>,
    pub prefer_light: Rc<MediaQuery>,
    /// Observed for change events only; nothing resolves against it yet.
    pub prefer_high_contrast: Rc<MediaQuery>,
}

impl SystemSignals {
    pub fn new(prefer_dark: bool, prefer_light: bool, prefer_high_contrast: bool) -> Self {
        Self {
            prefer_dark: Rc::new(MediaQuery::new(PREFERS_DARK, prefer_dark)),
            prefer_light: Rc::new(MediaQuery::new(PREFERS_LIGHT, prefer_light)),
            prefer_high_contrast: Rc::new(MediaQuery::new(PREFERS_HIGH_CONTRAST, prefer_high_contrast)),
        }
    }

    /// No OS preference reported at all.
    pub fn unsupported() -> Self {
        Self::new(false, false, false)
    }

    pub fn all(&self) -> [&Rc<MediaQuery>; 3] {
        [&self.prefer_dark, &self.prefer_light, &self.prefer_high_contrast]
    }
}
