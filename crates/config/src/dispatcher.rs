// Application action channel
// Handlers are registered explicitly and get every dispatched action, synchronously

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::callbacks::{CallbackList, ListenerId};

/// Actions routed through the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Re-resolve the theme. `force_theme` skips resolution and applies the
    /// given theme as-is (local echo of a remote theme change can lag).
    RecheckTheme {
        #[serde(default)]
        force_theme: Option<String>,
    },
}

pub type DispatcherRef = ListenerId;

#[derive(Default)]
pub struct Dispatcher {
    handlers: CallbackList<Action>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handler: impl FnMut(&Action) + 'static) -> DispatcherRef {
        self.handlers.add(handler)
    }

    pub fn unregister(&self, id: DispatcherRef) -> bool {
        self.handlers.remove(id)
    }

    pub fn dispatch(&self, action: Action) {
        log::debug!("Dispatching {:?} to {} handler(s)", action, self.handlers.len());
        self.handlers.emit(&action);
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
