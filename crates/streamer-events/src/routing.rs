//! Shared native event channel.
//!
//! # Design
//! - One emitter carries every session; listeners are keyed by [`ChannelKey`].
//! - `emit` dispatches synchronously and in registration order, with the
//!   listener table unlocked so callbacks may add or remove listeners.
//! - A listener removed mid-dispatch is skipped for the remainder of that dispatch.
//! - Every emission is also published on a `tokio::broadcast` tap so async
//!   observers can follow the raw stream without registering callbacks.

use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use chrono::Utc;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::trace;

use crate::error::EventsResult;
use crate::payloads::{DEFAULT_TAP_CAPACITY, EventId, NativeEnvelope};
use crate::topics::ChannelKey;

/// Stream wrapper handed to channel observers.
pub type EventStream = BroadcastStream<NativeEnvelope>;

type Callback = Arc<dyn Fn(&Value) + Send + Sync>;

struct Slot {
    id: u64,
    active: Arc<AtomicBool>,
    callback: Callback,
}

struct ChannelInner {
    listeners: Mutex<HashMap<ChannelKey, Vec<Slot>>>,
    next_listener: AtomicU64,
    next_event: AtomicU64,
    tap: broadcast::Sender<NativeEnvelope>,
}

impl ChannelInner {
    fn lock_listeners(&self) -> MutexGuard<'_, HashMap<ChannelKey, Vec<Slot>>> {
        self.listeners
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn detach(&self, key: &ChannelKey, id: u64) {
        let mut listeners = self.lock_listeners();
        if let Some(slots) = listeners.get_mut(key) {
            slots.retain(|slot| slot.id != id);
            if slots.is_empty() {
                listeners.remove(key);
            }
        }
    }
}

/// Process-wide emitter shared by the native module and its consumers.
#[derive(Clone)]
pub struct NativeEventChannel {
    inner: Arc<ChannelInner>,
}

impl NativeEventChannel {
    /// Construct a channel whose observer tap buffers `tap_capacity` envelopes.
    ///
    /// # Panics
    ///
    /// Panics if `tap_capacity` is zero.
    #[must_use]
    pub fn with_capacity(tap_capacity: usize) -> Self {
        let (tap, _) = broadcast::channel(tap_capacity);
        Self {
            inner: Arc::new(ChannelInner {
                listeners: Mutex::new(HashMap::new()),
                next_listener: AtomicU64::new(1),
                next_event: AtomicU64::new(1),
                tap,
            }),
        }
    }

    /// Construct a channel with the default observer buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TAP_CAPACITY)
    }

    /// Attach a callback to `key`. The returned handle detaches it on
    /// [`NativeListener::remove`] or when dropped.
    #[must_use = "dropping the handle detaches the listener"]
    pub fn add_listener<F>(&self, key: ChannelKey, callback: F) -> NativeListener
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));
        self.inner
            .lock_listeners()
            .entry(key.clone())
            .or_default()
            .push(Slot {
                id,
                active: Arc::clone(&active),
                callback: Arc::new(callback),
            });
        trace!(channel = %key, listener = id, "native listener attached");
        NativeListener {
            key,
            id,
            active,
            channel: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `payload` to every listener on `key`, returning how many ran.
    #[must_use]
    pub fn emit(&self, key: &ChannelKey, payload: Value) -> usize {
        let id: EventId = self.inner.next_event.fetch_add(1, Ordering::Relaxed);
        let snapshot: Vec<(Arc<AtomicBool>, Callback)> = self
            .inner
            .lock_listeners()
            .get(key)
            .map(|slots| {
                slots
                    .iter()
                    .map(|slot| (Arc::clone(&slot.active), Arc::clone(&slot.callback)))
                    .collect()
            })
            .unwrap_or_default();

        let mut delivered = 0;
        for (active, callback) in &snapshot {
            if active.load(Ordering::Acquire) {
                callback(&payload);
                delivered += 1;
            }
        }
        trace!(channel = %key, event_id = id, delivered, "native event dispatched");

        if self.inner.tap.receiver_count() > 0 {
            let _ = self.inner.tap.send(NativeEnvelope {
                id,
                timestamp: Utc::now(),
                key: key.clone(),
                payload,
            });
        }
        delivered
    }

    /// Deliver a payload addressed by its native string name (`kind` + session).
    ///
    /// # Errors
    ///
    /// Returns an error when `name` does not start with a known event kind.
    pub fn emit_named(&self, name: &str, payload: Value) -> EventsResult<usize> {
        let key = ChannelKey::parse(name)?;
        Ok(self.emit(&key, payload))
    }

    /// Observe every emission as an async stream of envelopes.
    #[must_use]
    pub fn subscribe(&self) -> EventStream {
        BroadcastStream::new(self.inner.tap.subscribe())
    }

    /// Number of listeners attached to `key`.
    #[must_use]
    pub fn listener_count(&self, key: &ChannelKey) -> usize {
        self.inner.lock_listeners().get(key).map_or(0, Vec::len)
    }

    /// Number of listeners attached across every key.
    #[must_use]
    pub fn total_listeners(&self) -> usize {
        self.inner.lock_listeners().values().map(Vec::len).sum()
    }
}

impl Default for NativeEventChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for NativeEventChannel {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("NativeEventChannel")
            .field("listeners", &self.total_listeners())
            .finish()
    }
}

/// Handle for a callback attached to the native channel.
pub struct NativeListener {
    key: ChannelKey,
    id: u64,
    active: Arc<AtomicBool>,
    channel: Weak<ChannelInner>,
}

impl NativeListener {
    /// Channel key the listener is attached to.
    #[must_use]
    pub const fn key(&self) -> &ChannelKey {
        &self.key
    }

    /// Whether the listener is still attached.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Detach the listener. Returns `false` if it was already detached.
    #[must_use]
    pub fn remove(&self) -> bool {
        if !self.active.swap(false, Ordering::AcqRel) {
            return false;
        }
        if let Some(channel) = self.channel.upgrade() {
            channel.detach(&self.key, self.id);
        }
        trace!(channel = %self.key, listener = self.id, "native listener detached");
        true
    }
}

impl Drop for NativeListener {
    fn drop(&mut self) {
        let _ = self.remove();
    }
}

impl Debug for NativeListener {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("NativeListener")
            .field("key", &self.key)
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payloads::{EventKind, SessionId};
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::timeout;
    use tokio_stream::StreamExt;

    fn key(kind: EventKind, session: &str) -> ChannelKey {
        ChannelKey::scoped(kind, SessionId::new(session).expect("valid session id"))
    }

    #[test]
    fn emit_runs_listeners_in_registration_order() {
        let channel = NativeEventChannel::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let status = key(EventKind::Status, "magnet:A");

        let handles: Vec<_> = (0..3)
            .map(|index| {
                let order = Arc::clone(&order);
                channel.add_listener(status.clone(), move |_| {
                    order.lock().expect("order lock").push(index);
                })
            })
            .collect();

        assert_eq!(channel.emit(&status, json!({})), 3);
        assert_eq!(*order.lock().expect("order lock"), vec![0, 1, 2]);
        assert_eq!(handles.len(), 3);
    }

    #[test]
    fn emit_only_reaches_matching_session() {
        let channel = NativeEventChannel::new();
        let hits = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&hits);
        let _listener = channel.add_listener(key(EventKind::Ready, "magnet:A"), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(channel.emit(&key(EventKind::Ready, "magnet:B"), json!({})), 0);
        assert_eq!(channel.emit(&key(EventKind::Error, "magnet:A"), json!({})), 0);
        assert_eq!(channel.emit(&key(EventKind::Ready, "magnet:A"), json!({})), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_removed_mid_dispatch_is_skipped() {
        let channel = NativeEventChannel::new();
        let ready = key(EventKind::Ready, "magnet:A");
        let second_ran = Arc::new(AtomicBool::new(false));
        let slot: Arc<Mutex<Option<NativeListener>>> = Arc::new(Mutex::new(None));

        let victim = Arc::clone(&slot);
        let _first = channel.add_listener(ready.clone(), move |_| {
            if let Some(listener) = victim.lock().expect("slot lock").take() {
                assert!(listener.remove());
            }
        });
        let flag = Arc::clone(&second_ran);
        let second = channel.add_listener(ready.clone(), move |_| {
            flag.store(true, Ordering::SeqCst);
        });
        *slot.lock().expect("slot lock") = Some(second);

        assert_eq!(channel.emit(&ready, json!({})), 1);
        assert!(!second_ran.load(Ordering::SeqCst));
        assert_eq!(channel.listener_count(&ready), 1);
    }

    #[test]
    fn dropping_handle_detaches_listener() {
        let channel = NativeEventChannel::new();
        let stop = key(EventKind::Stop, "magnet:A");
        let listener = channel.add_listener(stop.clone(), |_| {});
        assert_eq!(channel.listener_count(&stop), 1);
        assert!(listener.is_active());
        drop(listener);
        assert_eq!(channel.listener_count(&stop), 0);
        assert_eq!(channel.total_listeners(), 0);
    }

    #[test]
    fn remove_is_idempotent() {
        let channel = NativeEventChannel::new();
        let listener = channel.add_listener(ChannelKey::global(EventKind::Stop), |_| {});
        assert!(listener.remove());
        assert!(!listener.remove());
        assert!(!listener.is_active());
    }

    #[test]
    fn emit_named_routes_suffixed_names() {
        let channel = NativeEventChannel::new();
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let _listener = channel.add_listener(key(EventKind::Error, "magnet:A"), move |payload| {
            *sink.lock().expect("sink lock") = Some(payload.clone());
        });

        let delivered = channel
            .emit_named("errormagnet:A", json!({"msg": "no peers"}))
            .expect("routable name");
        assert_eq!(delivered, 1);
        assert_eq!(
            seen.lock().expect("sink lock").as_ref(),
            Some(&json!({"msg": "no peers"}))
        );
        assert!(channel.emit_named("bogus", json!({})).is_err());
    }

    #[tokio::test]
    async fn subscribe_observes_emissions_with_sequential_ids() {
        let channel = NativeEventChannel::with_capacity(8);
        let mut stream = channel.subscribe();
        let status = key(EventKind::Status, "magnet:A");

        let _ = channel.emit(&status, json!({"progress": "0.1"}));
        let _ = channel.emit(&status, json!({"progress": "0.2"}));

        let first = timeout(Duration::from_millis(100), stream.next())
            .await
            .expect("timed out waiting for envelope")
            .expect("stream closed")
            .expect("broadcast ok");
        let second = timeout(Duration::from_millis(100), stream.next())
            .await
            .expect("timed out waiting for envelope")
            .expect("stream closed")
            .expect("broadcast ok");

        assert_eq!(first.key, status);
        assert_eq!(second.id, first.id + 1);
        assert_eq!(second.payload, json!({"progress": "0.2"}));
    }
}
