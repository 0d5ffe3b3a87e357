use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use crate::foundation::core::ScrollProgress;

type Listener = Box<dyn FnMut(ScrollProgress)>;

struct SignalInner {
    value: ScrollProgress,
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
    notifying: bool,
    dropped_during_notify: Vec<u64>,
}

/// Observable scroll progress with any number of independent read-only consumers.
///
/// The value is published once per scroll/resize event and every live subscriber sees the same
/// number. Subscriptions are RAII guards: dropping a [`Subscription`] deregisters the listener,
/// so tearing down a consumer can never leave a callback pointed at it.
///
/// Single-threaded by construction (`Rc`), matching the event loop that owns it.
#[derive(Clone)]
pub struct ProgressSignal {
    inner: Rc<RefCell<SignalInner>>,
}

impl Default for ProgressSignal {
    fn default() -> Self {
        Self::new(ScrollProgress::START)
    }
}

impl std::fmt::Debug for ProgressSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("ProgressSignal")
            .field("value", &inner.value)
            .field("listeners", &inner.listeners.len())
            .finish()
    }
}

impl ProgressSignal {
    pub fn new(initial: ScrollProgress) -> Self {
        Self {
            inner: Rc::new(RefCell::new(SignalInner {
                value: initial,
                next_id: 0,
                listeners: Vec::new(),
                notifying: false,
                dropped_during_notify: Vec::new(),
            })),
        }
    }

    pub fn get(&self) -> ScrollProgress {
        self.inner.borrow().value
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }

    pub fn subscribe(&self, listener: impl FnMut(ScrollProgress) + 'static) -> Subscription {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.push((id, Box::new(listener)));
        Subscription {
            id,
            signal: Rc::downgrade(&self.inner),
        }
    }

    /// Store `value` and notify subscribers if it changed.
    ///
    /// Returns whether a notification went out.
    pub fn set(&self, value: ScrollProgress) -> bool {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.value == value {
                return false;
            }
            inner.value = value;
        }
        self.notify(value);
        true
    }

    fn notify(&self, value: ScrollProgress) {
        // Listeners run outside the borrow so they may subscribe or drop guards re-entrantly.
        let mut listeners = {
            let mut inner = self.inner.borrow_mut();
            inner.notifying = true;
            std::mem::take(&mut inner.listeners)
        };
        for (_, listener) in &mut listeners {
            listener(value);
        }
        let mut inner = self.inner.borrow_mut();
        let added = std::mem::take(&mut inner.listeners);
        listeners.extend(added);
        let dropped = std::mem::take(&mut inner.dropped_during_notify);
        listeners.retain(|(id, _)| !dropped.contains(id));
        inner.listeners = listeners;
        inner.notifying = false;
    }
}

/// Guard returned by [`ProgressSignal::subscribe`]; unsubscribes on drop.
#[must_use = "dropping a Subscription immediately unsubscribes"]
pub struct Subscription {
    id: u64,
    signal: Weak<RefCell<SignalInner>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(inner) = self.signal.upgrade() else {
            return;
        };
        let Ok(mut inner) = inner.try_borrow_mut() else {
            tracing::warn!(id = self.id, "subscription dropped while signal was borrowed");
            return;
        };
        inner.listeners.retain(|(id, _)| *id != self.id);
        if inner.notifying {
            inner.dropped_during_notify.push(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
