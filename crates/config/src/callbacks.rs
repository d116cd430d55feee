// Listener bookkeeping shared by media queries and the dispatcher

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Handle returned when registering a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

type Callback<A> = Rc<RefCell<dyn FnMut(&A)>>;

/// Ordered listener list with snapshot delivery.
///
/// `emit` copies the registered handles before calling anything, so a
/// listener may add or remove listeners (itself included) while being called.
/// Handles removed mid-cycle are skipped; handles added mid-cycle wait for the
/// next emit.
pub struct CallbackList<A: ?Sized> {
    next_id: Cell<u64>,
    entries: RefCell<Vec<(ListenerId, Callback<A>)>>,
}

impl<A: ?Sized> CallbackList<A> {
    pub fn new() -> Self {
        Self {
            next_id: Cell::new(1),
            entries: RefCell::new(Vec::new()),
        }
    }

    pub fn add(&self, callback: impl FnMut(&A) + 'static) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        let callback: Callback<A> = Rc::new(RefCell::new(callback));
        self.entries.borrow_mut().push((id, callback));
        id
    }

    /// Returns false if the id was not registered (already removed, or foreign).
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    pub fn contains(&self, id: ListenerId) -> bool {
        self.entries.borrow().iter().any(|(entry_id, _)| *entry_id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn emit(&self, arg: &A) {
        let snapshot: Vec<(ListenerId, Callback<A>)> = self
            .entries
            .borrow()
            .iter()
            .map(|(id, cb)| (*id, Rc::clone(cb)))
            .collect();

        for (id, callback) in snapshot {
            if !self.contains(id) {
                continue;
            }
            invoke_guarded(&*callback, id, |f| f(arg));
        }
    }
}

impl<A: ?Sized> Default for CallbackList<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: ?Sized> fmt::Debug for CallbackList<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackList").field("listeners", &self.len()).finish()
    }
}

/// Run `call` against a callback unless that callback is already on the stack.
///
/// A listener whose own side effects re-trigger it would otherwise recurse
/// without bound; the nested call is dropped instead.
pub(crate) fn invoke_guarded<F: ?Sized>(
    callback: &RefCell<F>,
    id: impl fmt::Display,
    call: impl FnOnce(&mut F),
) {
    match callback.try_borrow_mut() {
        Ok(mut f) => call(&mut *f),
        Err(_) => log::warn!("Skipping re-entrant call to {} (already running)", id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_in_registration_order() {
        let list: CallbackList<u32> = CallbackList::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let seen = Rc::clone(&seen);
            list.add(move |v: &u32| seen.borrow_mut().push(format!("{tag}{v}")));
        }

        list.emit(&7);
        assert_eq!(*seen.borrow(), vec!["a7", "b7", "c7"]);
    }

    #[test]
    fn test_removed_during_emit_is_skipped() {
        let list: Rc<CallbackList<()>> = Rc::new(CallbackList::new());
        let hits = Rc::new(Cell::new(0));

        // The first listener removes the second before it runs
        let victim = Rc::new(Cell::new(None));
        let list_in_cb = Rc::clone(&list);
        let victim_in_cb = Rc::clone(&victim);
        list.add(move |_| {
            if let Some(id) = victim_in_cb.get() {
                list_in_cb.remove(id);
            }
        });
        let hits_clone = Rc::clone(&hits);
        let id = list.add(move |_| hits_clone.set(hits_clone.get() + 1));
        victim.set(Some(id));

        list.emit(&());
        assert_eq!(hits.get(), 0);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_reentrant_emit_does_not_recurse() {
        let list: Rc<CallbackList<()>> = Rc::new(CallbackList::new());
        let hits = Rc::new(Cell::new(0));

        let inner = Rc::clone(&list);
        let hits_clone = Rc::clone(&hits);
        list.add(move |_| {
            hits_clone.set(hits_clone.get() + 1);
            inner.emit(&());
        });

        list.emit(&());
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let list: CallbackList<()> = CallbackList::new();
        let id = list.add(|_| {});
        assert!(list.remove(id));
        assert!(!list.remove(id));
        assert!(list.is_empty());
    }
}
