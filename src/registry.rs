use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// A fan-out list of listeners held by weak reference.
///
/// The registry never keeps a listener alive: the application owns its
/// listeners and should [`remove`](SubscriberRegistry::remove) them before
/// tearing them down. Entries whose listener has already been dropped are
/// pruned on the next traversal.
pub struct SubscriberRegistry<L: ?Sized> {
    entries: Mutex<Vec<Weak<L>>>,
}

fn same<L: ?Sized>(a: &Arc<L>, b: &Arc<L>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

impl<L: ?Sized> SubscriberRegistry<L> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Add a listener. Returns `false` if it was already registered.
    pub fn add(&self, listener: &Arc<L>) -> bool {
        let mut entries = self.entries.lock();
        entries.retain(|w| w.strong_count() > 0);
        if entries
            .iter()
            .filter_map(Weak::upgrade)
            .any(|l| same(&l, listener))
        {
            return false;
        }
        entries.push(Arc::downgrade(listener));
        true
    }

    /// Add a listener by weak handle. Returns `false` if the listener is
    /// already gone or already registered.
    pub fn add_weak(&self, listener: &Weak<L>) -> bool {
        match listener.upgrade() {
            Some(listener) => self.add(&listener),
            None => false,
        }
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn remove(&self, listener: &Arc<L>) -> bool {
        let mut removed = false;
        self.entries.lock().retain(|w| match w.upgrade() {
            Some(l) if same(&l, listener) => {
                removed = true;
                false
            }
            Some(_) => true,
            None => false,
        });
        removed
    }

    pub fn contains(&self, listener: &Arc<L>) -> bool {
        self.entries
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .any(|l| same(&l, listener))
    }

    /// The live listeners, in registration order. Dead entries are pruned.
    pub fn live(&self) -> Vec<Arc<L>> {
        let mut entries = self.entries.lock();
        let mut live = Vec::with_capacity(entries.len());
        entries.retain(|w| match w.upgrade() {
            Some(l) => {
                live.push(l);
                true
            }
            None => false,
        });
        live
    }

    /// Deliver an event to every live listener in registration order and
    /// return how many received it.
    ///
    /// The list is snapshotted first, so listeners may add or remove
    /// entries from inside `deliver`.
    pub fn notify_all(&self, mut deliver: impl FnMut(&L)) -> usize {
        let live = self.live();
        for listener in &live {
            deliver(&**listener);
        }
        live.len()
    }

    /// Number of entries, including ones not yet pruned.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl<L: ?Sized> Default for SubscriberRegistry<L> {
    fn default() -> Self {
        Self::new()
    }
}
