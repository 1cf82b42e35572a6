//! Notification plumbing shared by viewports and locations.
//!
//! Everything runs on one thread; listeners are plain `Rc` closures and
//! emitting never holds a borrow while a listener runs, so a listener may
//! add or remove listeners (or trigger further notifications) freely.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Callback invoked on a notification.
pub type Listener = Rc<dyn Fn()>;

/// Handle returned on subscribe, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
pub struct Listeners {
    next_id: Cell<u64>,
    entries: RefCell<Vec<(ListenerId, Listener)>>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.entries.borrow_mut().push((id, listener));
        id
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Calls every listener registered at the time of the call.
    pub fn emit(&self) {
        let snapshot: Vec<Listener> = self
            .entries
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();

        for listener in snapshot {
            listener();
        }
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_to_every_listener() {
        let listeners = Listeners::new();
        let hits = Rc::new(Cell::new(0));

        for _ in 0..3 {
            let hits = Rc::clone(&hits);
            listeners.add(Rc::new(move || hits.set(hits.get() + 1)));
        }

        listeners.emit();
        assert_eq!(hits.get(), 3);
    }

    #[test]
    fn removed_listener_is_not_called() {
        let listeners = Listeners::new();
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        let id = listeners.add(Rc::new(move || counter.set(counter.get() + 1)));

        assert!(listeners.remove(id));
        assert!(!listeners.remove(id));
        listeners.emit();

        assert_eq!(hits.get(), 0);
        assert!(listeners.is_empty());
    }

    #[test]
    fn listener_may_unsubscribe_itself_while_emitting() {
        let listeners = Rc::new(Listeners::new());
        let own_id = Rc::new(Cell::new(None));

        let registry = Rc::clone(&listeners);
        let slot = Rc::clone(&own_id);
        let id = listeners.add(Rc::new(move || {
            if let Some(id) = slot.get() {
                registry.remove(id);
            }
        }));
        own_id.set(Some(id));

        listeners.emit();
        assert!(listeners.is_empty());
    }
}
