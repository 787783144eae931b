//! Typed subscription registry.

use crate::event_source::event::SourceEvent;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Callback invoked synchronously for each dispatched event.
pub type Listener = Arc<dyn Fn(&SourceEvent) + Send + Sync>;

/// Handle returned on registration, used to remove the listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
pub struct Listeners {
    next_id: AtomicU64,
    by_type: Mutex<HashMap<String, Vec<(ListenerId, Listener)>>>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<(ListenerId, Listener)>>> {
        // a listener that panicked does not leave the map inconsistent
        self.by_type.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add(&self, event_type: impl Into<String>, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock()
            .entry(event_type.into())
            .or_default()
            .push((id, listener));
        id
    }

    /// Returns false if the id was not registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut by_type = self.lock();
        let mut removed = false;
        by_type.retain(|_, list| {
            let before = list.len();
            list.retain(|(listener_id, _)| *listener_id != id);
            removed |= list.len() != before;
            !list.is_empty()
        });
        removed
    }

    /// Snapshot of the listeners for `event_type`, in registration order.
    pub fn listeners_for(&self, event_type: &str) -> Vec<Listener> {
        self.lock()
            .get(event_type)
            .map(|list| list.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every listener for the event's type, each one under a guard from `enter`.
    ///
    /// `enter` runs before every callback and the guard it returns is held until
    /// that callback returns; `None` stops the dispatch. The registry lock is
    /// released before any callback runs, so listeners may register or remove
    /// listeners. Returns the number of callbacks invoked.
    pub fn dispatch_gated<G, F>(&self, event: &SourceEvent, mut enter: F) -> usize
    where
        F: FnMut() -> Option<G>,
    {
        let mut invoked = 0;
        for listener in self.listeners_for(event.event_type()) {
            let Some(_guard) = enter() else {
                break;
            };
            listener(event);
            invoked += 1;
        }
        invoked
    }

    pub fn dispatch(&self, event: &SourceEvent) -> usize {
        self.dispatch_gated(event, || Some(()))
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let by_type = self.lock();
        let mut counts: Vec<_> = by_type.iter().map(|(k, v)| (k.clone(), v.len())).collect();
        counts.sort();
        f.debug_struct("Listeners").field("by_type", &counts).finish()
    }
}
