//! The shareable location fragment (`#...`) of a browsing context.

use crate::events::{Listener, ListenerId, Listeners};
use std::cell::{Cell, RefCell};

/// Readable, replaceable, observable location fragment.
///
/// `read` includes the leading `#`, or is empty when there is no fragment.
/// Subscribers hear about every change, including ones made through
/// [`AddressableLocation::replace`].
pub trait AddressableLocation {
    fn read(&self) -> String;

    /// Overwrites the current fragment without adding a history entry.
    fn replace(&self, fragment: &str);

    fn subscribe(&self, listener: Listener) -> ListenerId;

    fn unsubscribe(&self, id: ListenerId);
}

/// True if `fragment` carries anything past a single `#` marker.
pub fn has_fragment(fragment: &str) -> bool {
    !fragment.strip_prefix('#').unwrap_or(fragment).is_empty()
}

/// Browsers report no fragment for a bare `#`, and always include the marker otherwise.
fn normalize(fragment: &str) -> String {
    if !has_fragment(fragment) {
        String::new()
    } else if fragment.starts_with('#') {
        fragment.to_string()
    } else {
        format!("#{fragment}")
    }
}

#[derive(Debug)]
struct History {
    entries: Vec<String>,
    index: usize,
}

impl History {
    fn current(&self) -> &str {
        &self.entries[self.index]
    }
}

/// In-memory location with a navigation history.
///
/// `navigate` behaves like following a link (pushes an entry, drops any
/// forward entries), `back`/`forward` walk the history, and `replace`
/// rewrites the current entry in place.
#[derive(Debug)]
pub struct MemoryLocation {
    history: RefCell<History>,
    replacements: Cell<usize>,
    listeners: Listeners,
}

impl MemoryLocation {
    pub fn new(initial: &str) -> Self {
        Self {
            history: RefCell::new(History {
                entries: vec![normalize(initial)],
                index: 0,
            }),
            replacements: Cell::new(0),
            listeners: Listeners::new(),
        }
    }

    /// Pushes a new history entry. Navigating to the current fragment does nothing.
    pub fn navigate(&self, fragment: &str) {
        let fragment = normalize(fragment);
        {
            let mut history = self.history.borrow_mut();
            if history.current() == fragment {
                return;
            }
            let keep = history.index + 1;
            history.entries.truncate(keep);
            history.entries.push(fragment);
            history.index = keep;
        }
        self.listeners.emit();
    }

    /// Steps back one entry. Returns false at the start of history.
    pub fn back(&self) -> bool {
        self.step(|history| history.index.checked_sub(1))
    }

    /// Steps forward one entry. Returns false at the end of history.
    pub fn forward(&self) -> bool {
        self.step(|history| {
            let next = history.index + 1;
            (next < history.entries.len()).then_some(next)
        })
    }

    pub fn history_len(&self) -> usize {
        self.history.borrow().entries.len()
    }

    /// Number of calls to [`AddressableLocation::replace`] so far.
    pub fn replacements(&self) -> usize {
        self.replacements.get()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn step(&self, target: impl FnOnce(&History) -> Option<usize>) -> bool {
        let changed = {
            let mut history = self.history.borrow_mut();
            let Some(index) = target(&history) else {
                return false;
            };
            let before = history.current().to_string();
            history.index = index;
            history.current() != before
        };
        if changed {
            self.listeners.emit();
        }
        true
    }
}

impl Default for MemoryLocation {
    fn default() -> Self {
        Self::new("")
    }
}

impl AddressableLocation for MemoryLocation {
    fn read(&self) -> String {
        self.history.borrow().current().to_string()
    }

    fn replace(&self, fragment: &str) {
        let fragment = normalize(fragment);
        self.replacements.set(self.replacements.get() + 1);
        let changed = {
            let mut history = self.history.borrow_mut();
            let index = history.index;
            let changed = history.entries[index] != fragment;
            history.entries[index] = fragment;
            changed
        };
        if changed {
            self.listeners.emit();
        }
    }

    fn subscribe(&self, listener: Listener) -> ListenerId {
        self.listeners.add(listener)
    }

    fn unsubscribe(&self, id: ListenerId) {
        self.listeners.remove(id);
    }
}
