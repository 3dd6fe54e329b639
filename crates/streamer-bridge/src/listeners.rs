//! Per-kind registry of user handlers.
//!
//! # Design
//! - Handlers are independent of session identity and survive stop/start.
//! - Insertion order is invocation order.
//! - Dispatch snapshots the handler list and runs it with no lock held, so a
//!   handler may register or remove handlers (or call back into the bridge).

use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use streamer_core::BridgeEvent;
use streamer_events::EventKind;

type HandlerFn = dyn Fn(&BridgeEvent) + Send + Sync;

/// Shared handler callback; identity is the underlying allocation.
#[derive(Clone)]
pub struct EventHandler(Arc<HandlerFn>);

impl EventHandler {
    /// Wrap a closure as a handler.
    #[must_use]
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&BridgeEvent) + Send + Sync + 'static,
    {
        Self(Arc::new(callback))
    }

    /// Whether both values refer to the same callback.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn call(&self, event: &BridgeEvent) {
        (self.0)(event);
    }
}

impl Debug for EventHandler {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EventHandler")
            .field(&Arc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}

struct Entry {
    id: u64,
    handler: EventHandler,
}

#[derive(Default)]
pub(crate) struct ListenerRegistry {
    entries: Mutex<HashMap<EventKind, Vec<Entry>>>,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    pub(crate) fn add(&self, kind: EventKind, handler: EventHandler) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().entry(kind).or_default().push(Entry { id, handler });
        id
    }

    pub(crate) fn remove_id(&self, kind: EventKind, id: u64) -> bool {
        self.retain(kind, |entry| entry.id != id)
    }

    /// Removes every registration of `handler` for `kind`.
    pub(crate) fn remove_handler(&self, kind: EventKind, handler: &EventHandler) -> bool {
        self.retain(kind, |entry| !entry.handler.same_as(handler))
    }

    pub(crate) fn snapshot(&self, kind: EventKind) -> Vec<EventHandler> {
        self.lock()
            .get(&kind)
            .map(|entries| entries.iter().map(|entry| entry.handler.clone()).collect())
            .unwrap_or_default()
    }

    pub(crate) fn count(&self, kind: EventKind) -> usize {
        self.lock().get(&kind).map_or(0, Vec::len)
    }

    pub(crate) fn kinds(&self) -> Vec<EventKind> {
        let entries = self.lock();
        EventKind::PUBLIC
            .into_iter()
            .filter(|kind| entries.get(kind).is_some_and(|list| !list.is_empty()))
            .collect()
    }

    fn retain<P>(&self, kind: EventKind, keep: P) -> bool
    where
        P: Fn(&Entry) -> bool,
    {
        let mut entries = self.lock();
        let Some(list) = entries.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|entry| keep(entry));
        before != list.len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<EventKind, Vec<Entry>>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Handle returned by `add_event_listener`; removing it detaches only that registration.
///
/// Dropping the handle keeps the handler registered.
#[derive(Debug, Clone)]
pub struct Subscription {
    kind: Option<EventKind>,
    id: u64,
    registry: Weak<ListenerRegistry>,
}

impl Subscription {
    pub(crate) fn new(kind: EventKind, id: u64, registry: &Arc<ListenerRegistry>) -> Self {
        Self {
            kind: Some(kind),
            id,
            registry: Arc::downgrade(registry),
        }
    }

    /// Subscription that is not attached to anything.
    #[must_use]
    pub const fn inert() -> Self {
        Self {
            kind: None,
            id: 0,
            registry: Weak::new(),
        }
    }

    /// Kind the handler was registered for; `None` when inert.
    #[must_use]
    pub const fn kind(&self) -> Option<EventKind> {
        self.kind
    }

    /// Whether the subscription was never attached.
    #[must_use]
    pub const fn is_inert(&self) -> bool {
        self.kind.is_none()
    }

    /// Detach the handler. Returns `false` if it was already removed or inert.
    #[must_use]
    pub fn remove(&self) -> bool {
        match (self.kind, self.registry.upgrade()) {
            (Some(kind), Some(registry)) => registry.remove_id(kind, self.id),
            _ => false,
        }
    }
}

impl Debug for ListenerRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let entries = self.lock();
        let mut map = f.debug_map();
        for (kind, list) in entries.iter() {
            map.entry(kind, &list.len());
        }
        map.finish()
    }
}
