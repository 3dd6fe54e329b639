//! Session bridge over the shared native event channel.
//!
//! # Design
//! - One active session per bridge value; a new `start` tears the previous
//!   session down before any listener for the new one is attached.
//! - The native channel multiplexes sessions by key, so the per-kind native
//!   listeners are rebuilt whenever the active session changes. User handlers
//!   live in a separate registry and survive stop/start.
//! - `start` settles exactly once through a shared oneshot sender; the first
//!   of `ready`, `error`, a failed native command, or `stop` wins.
//! - Native calls and user handlers run with no bridge lock held. Lock order
//!   is bridge state, then the channel.

use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde_json::Value;
use streamer_config::BridgeConfig;
use streamer_core::{
    BridgeEvent, FileIndex, LARGEST_FILE_SENTINEL, NativeModule, SessionPhase, SessionResult,
    StartOptions,
};
use streamer_events::{ChannelKey, EventKind, NativeEventChannel, NativeListener, SessionId};
use streamer_telemetry::{Metrics, record_session_phase, session_span};
use tokio::sync::oneshot;
use tracing::{Instrument, Span, debug, info, trace, warn};

use crate::convert;
use crate::error::{BridgeError, BridgeResult};
use crate::listeners::{EventHandler, ListenerRegistry, Subscription};

type StartOutcome = BridgeResult<SessionResult>;

/// Client-side binding that exposes one native streaming session at a time.
#[derive(Clone)]
pub struct SessionBridge {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    native: Arc<dyn NativeModule>,
    channel: NativeEventChannel,
    config: BridgeConfig,
    handlers: Arc<ListenerRegistry>,
    metrics: Option<Metrics>,
    state: Mutex<BridgeState>,
}

#[derive(Default)]
struct BridgeState {
    active: Option<ActiveSession>,
    generation: u64,
}

struct ActiveSession {
    id: SessionId,
    generation: u64,
    phase: SessionPhase,
    started: bool,
    subscriptions: HashMap<EventKind, NativeListener>,
    pending: Option<PendingStart>,
    span: Span,
}

impl ActiveSession {
    fn advance(&mut self, next: SessionPhase) -> bool {
        if !self.phase.can_advance(next) {
            debug!(
                session = %self.id,
                from = self.phase.as_str(),
                to = next.as_str(),
                "ignoring out-of-order phase transition"
            );
            return false;
        }
        self.phase = next;
        record_session_phase(&self.span, next.as_str());
        true
    }

    /// Record the outcome of the start handshake. A `ready` that arrives
    /// before `start` was issued walks the phases it skipped.
    fn settle(&mut self, outcome: SessionPhase) {
        if outcome == SessionPhase::Ready {
            for skipped in [SessionPhase::Created, SessionPhase::Started] {
                if self.phase.can_advance(skipped) {
                    self.advance(skipped);
                }
            }
        }
        self.advance(outcome);
    }

    fn listener_count(&self) -> usize {
        self.subscriptions.len() + self.pending.as_ref().map_or(0, |p| p.internal.len())
    }
}

struct PendingStart {
    settle: Arc<Settle>,
    internal: Vec<NativeListener>,
}

/// Settle-once slot for the outcome of a `start` call.
struct Settle(Mutex<Option<oneshot::Sender<StartOutcome>>>);

impl Settle {
    fn new(sender: oneshot::Sender<StartOutcome>) -> Self {
        Self(Mutex::new(Some(sender)))
    }

    /// Returns `true` only for the call that settled the slot.
    fn complete(&self, outcome: StartOutcome) -> bool {
        let sender = self
            .0
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        match sender {
            Some(sender) => {
                let _ = sender.send(outcome);
                true
            }
            None => false,
        }
    }
}

/// Releases the internal listeners of a `start` call when its future is dropped.
struct StartGuard {
    inner: Weak<BridgeInner>,
    generation: u64,
}

impl Drop for StartGuard {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.release_pending(self.generation);
        }
    }
}

impl SessionBridge {
    /// Bridge with the default configuration.
    #[must_use]
    pub fn new(native: Arc<dyn NativeModule>, channel: NativeEventChannel) -> Self {
        Self::with_config(native, channel, BridgeConfig::default())
    }

    /// Bridge with an explicit configuration.
    #[must_use]
    pub fn with_config(
        native: Arc<dyn NativeModule>,
        channel: NativeEventChannel,
        config: BridgeConfig,
    ) -> Self {
        Self::build(native, channel, config, None)
    }

    /// Bridge that also records session counters into `metrics`.
    #[must_use]
    pub fn with_metrics(
        native: Arc<dyn NativeModule>,
        channel: NativeEventChannel,
        config: BridgeConfig,
        metrics: Metrics,
    ) -> Self {
        Self::build(native, channel, config, Some(metrics))
    }

    fn build(
        native: Arc<dyn NativeModule>,
        channel: NativeEventChannel,
        config: BridgeConfig,
        metrics: Option<Metrics>,
    ) -> Self {
        Self {
            inner: Arc::new(BridgeInner {
                native,
                channel,
                config,
                handlers: Arc::new(ListenerRegistry::default()),
                metrics,
                state: Mutex::new(BridgeState::default()),
            }),
        }
    }

    /// Start streaming `session` and wait for its stream URL.
    ///
    /// Any active session is stopped first. A session that never reports
    /// `ready` or `error` stays pending until it is stopped or replaced.
    /// Dropping the returned future detaches the listeners it created; the
    /// session itself stays active until [`SessionBridge::stop`].
    /// Largest-file auto-selection only covers the start handshake.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::InvalidArgument`] for an empty identifier (no native call is made).
    /// - [`BridgeError::SessionFailed`] when the native module emits `error`.
    /// - [`BridgeError::NativeCommand`] when `createTorrent` or `start` fails.
    /// - [`BridgeError::Cancelled`] when the session is stopped or replaced first.
    /// - [`BridgeError::MalformedPayload`] when `ready` carries no URL.
    pub async fn start(&self, session: &str, options: StartOptions) -> StartOutcome {
        let id = SessionId::new(session)
            .map_err(|_| BridgeError::InvalidArgument { field: "session" })?;
        self.stop();

        let (sender, receiver) = oneshot::channel();
        let settle = Arc::new(Settle::new(sender));
        let span = session_span(id.as_str());
        let generation = BridgeInner::begin(&self.inner, &id, &settle, span.clone());
        let _guard = StartGuard {
            inner: Arc::downgrade(&self.inner),
            generation,
        };

        let save_location = options
            .save_location
            .or_else(|| self.inner.config.default_save_location.clone());
        self.inner
            .issue_start(
                &id,
                generation,
                save_location.as_deref(),
                options.remove_after_stop,
            )
            .instrument(span)
            .await;

        receiver
            .await
            .unwrap_or_else(|_| Err(BridgeError::Cancelled { session: id }))
    }

    /// Stop the active session. Does nothing when idle.
    ///
    /// A pending `start` is rejected with [`BridgeError::Cancelled`]. User
    /// handlers stay registered for the next session.
    pub fn stop(&self) {
        let taken = self.inner.lock_state().active.take();
        let Some(active) = taken else {
            trace!("stop ignored; no active session");
            return;
        };
        self.inner.teardown(active);
    }

    /// Register `handler` for `kind`.
    ///
    /// `ready` is internal to [`SessionBridge::start`]; registering for it
    /// logs a warning and returns an inert subscription.
    #[must_use]
    pub fn add_event_listener(&self, kind: EventKind, handler: EventHandler) -> Subscription {
        if !kind.is_public() {
            warn!(event = %kind, "event kind is internal; listener ignored");
            return Subscription::inert();
        }
        let id = self.inner.handlers.add(kind, handler);
        {
            let mut state = self.inner.lock_state();
            if let Some(active) = state.active.as_mut()
                && !active.subscriptions.contains_key(&kind)
            {
                let listener = self.inner.subscribe(&active.id, kind);
                active.subscriptions.insert(kind, listener);
            }
        }
        Subscription::new(kind, id, &self.inner.handlers)
    }

    /// Register a closure for `kind`.
    #[must_use]
    pub fn on<F>(&self, kind: EventKind, callback: F) -> Subscription
    where
        F: Fn(&BridgeEvent) + Send + Sync + 'static,
    {
        self.add_event_listener(kind, EventHandler::new(callback))
    }

    /// Register `handler` for the kind named `name`.
    ///
    /// Unknown names log a warning and return an inert subscription.
    #[must_use]
    pub fn add_event_listener_named(&self, name: &str, handler: EventHandler) -> Subscription {
        match convert::event_kind(name) {
            Ok(kind) => self.add_event_listener(kind, handler),
            Err(error) => {
                warn!(error = %error, event = name, "listener ignored");
                Subscription::inert()
            }
        }
    }

    /// Remove every registration of `handler` for `kind`. The shared native
    /// listener for the kind is left in place.
    #[must_use]
    pub fn remove_event_listener(&self, kind: EventKind, handler: &EventHandler) -> bool {
        self.inner.handlers.remove_handler(kind, handler)
    }

    /// Remove `handler` from the kind named `name`.
    #[must_use]
    pub fn remove_event_listener_named(&self, name: &str, handler: &EventHandler) -> bool {
        match convert::event_kind(name) {
            Ok(kind) => self.remove_event_listener(kind, handler),
            Err(error) => {
                warn!(error = %error, event = name, "nothing removed");
                false
            }
        }
    }

    /// Choose the file streamed by the active session. Does nothing when idle.
    pub fn set_selected_file_index(&self, index: FileIndex) {
        let session = self.active_session();
        match session {
            Some(id) => self.inner.select_file(&id, index.as_native()),
            None => debug!("file selection ignored; no active session"),
        }
    }

    /// Hand a stream URL to an external viewer through the native module.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidArgument`] for an empty URL and
    /// [`BridgeError::NativeCommand`] when the native module refuses.
    pub fn open(&self, url: &str, mime_type: &str) -> BridgeResult<()> {
        if url.trim().is_empty() {
            return Err(BridgeError::InvalidArgument { field: "url" });
        }
        self.inner
            .native
            .open(url, mime_type)
            .map_err(|source| BridgeError::native("open", source))
    }

    /// Identifier of the active session, if any.
    #[must_use]
    pub fn active_session(&self) -> Option<SessionId> {
        self.inner
            .lock_state()
            .active
            .as_ref()
            .map(|active| active.id.clone())
    }

    /// Lifecycle phase of the active session; `Idle` when none.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.inner
            .lock_state()
            .active
            .as_ref()
            .map_or(SessionPhase::Idle, |active| active.phase)
    }

    /// Native channel listeners currently held for the active session.
    #[must_use]
    pub fn native_listener_count(&self) -> usize {
        self.inner
            .lock_state()
            .active
            .as_ref()
            .map_or(0, ActiveSession::listener_count)
    }

    /// User handlers registered for `kind`.
    #[must_use]
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.inner.handlers.count(kind)
    }

    /// Configuration the bridge was built with.
    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    /// Channel the bridge listens on.
    #[must_use]
    pub fn channel(&self) -> &NativeEventChannel {
        &self.inner.channel
    }
}

impl Debug for SessionBridge {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionBridge")
            .field("active_session", &self.active_session())
            .field("phase", &self.phase())
            .field("handlers", &self.inner.handlers)
            .finish_non_exhaustive()
    }
}

impl BridgeInner {
    fn lock_state(&self) -> MutexGuard<'_, BridgeState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Install `id` as the active session with its native listeners.
    fn begin(this: &Arc<Self>, id: &SessionId, settle: &Arc<Settle>, span: Span) -> u64 {
        let mut state = this.lock_state();
        let raced = state.active.take();
        if let Some(previous) = raced {
            // Another start slipped in after the implicit stop; tear it down
            // before any listener for `id` exists.
            drop(state);
            this.teardown(previous);
            state = this.lock_state();
        }
        state.generation += 1;
        let generation = state.generation;

        let subscriptions = this
            .handlers
            .kinds()
            .into_iter()
            .map(|kind| (kind, this.subscribe(id, kind)))
            .collect();
        let internal = this.internal_listeners(id, generation, settle);
        debug!(session = %id, generation, "session installed");
        state.active = Some(ActiveSession {
            id: id.clone(),
            generation,
            phase: SessionPhase::Idle,
            started: false,
            subscriptions,
            pending: Some(PendingStart {
                settle: Arc::clone(settle),
                internal,
            }),
            span,
        });
        generation
    }

    /// Issue `createTorrent` then `start`, unless the session was replaced in between.
    async fn issue_start(
        &self,
        id: &SessionId,
        generation: u64,
        save_location: Option<&str>,
        remove_after_stop: bool,
    ) {
        info!(session = %id, ?save_location, remove_after_stop, "creating native torrent");
        let created = self
            .native
            .create_torrent(id, save_location, remove_after_stop)
            .await;
        if let Err(source) = created {
            self.fail_pending(generation, BridgeError::native("create_torrent", source));
            return;
        }

        {
            let mut state = self.lock_state();
            let Some(active) = current(&mut state, generation) else {
                debug!(session = %id, "session replaced before start was issued");
                return;
            };
            if active.pending.is_none() || active.phase.is_settled() {
                debug!(
                    session = %id,
                    phase = active.phase.as_str(),
                    "start handshake settled during create; native start skipped"
                );
                return;
            }
            // `Started` is recorded before the call so events emitted
            // synchronously by the module see the final phase.
            if !(active.advance(SessionPhase::Created) && active.advance(SessionPhase::Started)) {
                return;
            }
            active.started = true;
        }
        if let Some(metrics) = &self.metrics {
            metrics.session_started();
        }

        info!(session = %id, "starting native torrent");
        if let Err(source) = self.native.start(id) {
            self.fail_pending(generation, BridgeError::native("start", source));
        }
    }

    /// Build the `ready`, `error` and `progress` listeners owned by one start call.
    fn internal_listeners(
        self: &Arc<Self>,
        id: &SessionId,
        generation: u64,
        settle: &Arc<Settle>,
    ) -> Vec<NativeListener> {
        let mut listeners = Vec::with_capacity(3);

        let weak = Arc::downgrade(self);
        let slot = Arc::clone(settle);
        listeners.push(self.channel.add_listener(
            ChannelKey::scoped(EventKind::Ready, id.clone()),
            move |payload: &Value| {
                let outcome = convert::ready_from_payload(payload);
                let phase = if outcome.is_ok() {
                    SessionPhase::Ready
                } else {
                    SessionPhase::Failed
                };
                if slot.complete(outcome)
                    && let Some(inner) = weak.upgrade()
                {
                    inner.finish_pending(generation, phase);
                }
            },
        ));

        let weak = Arc::downgrade(self);
        let slot = Arc::clone(settle);
        listeners.push(self.channel.add_listener(
            ChannelKey::scoped(EventKind::Error, id.clone()),
            move |payload: &Value| {
                let message = match convert::normalize(EventKind::Error, payload) {
                    Ok(BridgeEvent::Error(notice)) => notice.msg,
                    _ => String::new(),
                };
                if slot.complete(Err(BridgeError::SessionFailed { message }))
                    && let Some(inner) = weak.upgrade()
                {
                    inner.finish_pending(generation, SessionPhase::Failed);
                }
            },
        ));

        if self.config.auto_select_largest {
            let weak = Arc::downgrade(self);
            let session = id.clone();
            listeners.push(self.channel.add_listener(
                ChannelKey::scoped(EventKind::Progress, id.clone()),
                move |payload: &Value| {
                    let update = convert::progress_from_payload(payload);
                    if update.files.is_empty() {
                        return;
                    }
                    if let Some(inner) = weak.upgrade() {
                        debug!(
                            session = %session,
                            files = update.files.len(),
                            "selecting largest file"
                        );
                        inner.select_file(&session, LARGEST_FILE_SENTINEL);
                    }
                },
            ));
        }
        listeners
    }

    /// Native listener fanning `kind` events for `id` out to user handlers.
    fn subscribe(&self, id: &SessionId, kind: EventKind) -> NativeListener {
        let handlers = Arc::clone(&self.handlers);
        let metrics = self.metrics.clone();
        self.channel
            .add_listener(ChannelKey::scoped(kind, id.clone()), move |payload| {
                dispatch(&handlers, metrics.as_ref(), kind, payload);
            })
    }

    /// Record the settled phase and drop the internal listeners of `generation`.
    fn finish_pending(&self, generation: u64, phase: SessionPhase) {
        let released = {
            let mut state = self.lock_state();
            current(&mut state, generation).and_then(|active| {
                active.settle(phase);
                active.pending.take()
            })
        };
        if released.is_some()
            && let Some(metrics) = &self.metrics
        {
            match phase {
                SessionPhase::Ready => metrics.session_ready(),
                _ => metrics.session_failed(),
            }
        }
        drop(released);
    }

    /// Reject the pending start of `generation` with `error`.
    fn fail_pending(&self, generation: u64, error: BridgeError) {
        let pending = {
            let mut state = self.lock_state();
            current(&mut state, generation).and_then(|active| {
                active.advance(SessionPhase::Failed);
                active.pending.take()
            })
        };
        match pending {
            Some(pending) => {
                warn!(error = %error, "session start failed");
                pending.settle.complete(Err(error));
                if let Some(metrics) = &self.metrics {
                    metrics.session_failed();
                }
            }
            None => debug!(error = %error, "start failure for a replaced session ignored"),
        }
    }

    /// Drop the internal listeners of `generation` without settling.
    fn release_pending(&self, generation: u64) {
        let released = {
            let mut state = self.lock_state();
            current(&mut state, generation).and_then(|active| active.pending.take())
        };
        if released.is_some() {
            debug!(generation, "start abandoned; internal listeners released");
        }
    }

    /// Cancel, stop natively, then detach every listener of `active`.
    fn teardown(&self, active: ActiveSession) {
        let ActiveSession {
            id,
            started,
            subscriptions,
            pending,
            span,
            ..
        } = active;
        if let Some(pending) = pending
            && pending.settle.complete(Err(BridgeError::Cancelled {
                session: id.clone(),
            }))
            && let Some(metrics) = &self.metrics
        {
            metrics.session_failed();
        }
        record_session_phase(&span, SessionPhase::Idle.as_str());

        info!(session = %id, "stopping session");
        if let Err(error) = self.native.stop(&id) {
            warn!(session = %id, error = %error, "native stop failed");
        }
        drop(subscriptions);
        if started && let Some(metrics) = &self.metrics {
            metrics.session_stopped();
        }
    }

    fn select_file(&self, id: &SessionId, index: i32) {
        if let Err(error) = self.native.set_selected_file_index(id, index) {
            warn!(session = %id, index, error = %error, "native file selection failed");
        }
    }
}

fn current(state: &mut BridgeState, generation: u64) -> Option<&mut ActiveSession> {
    state
        .active
        .as_mut()
        .filter(|active| active.generation == generation)
}

fn dispatch(
    handlers: &ListenerRegistry,
    metrics: Option<&Metrics>,
    kind: EventKind,
    payload: &Value,
) {
    if let Some(metrics) = metrics {
        metrics.inc_native_event(kind.as_str());
    }
    let event = match convert::normalize(kind, payload) {
        Ok(event) => event,
        Err(error) => {
            warn!(event = %kind, error = %error, "dropping malformed native event");
            return;
        }
    };
    let snapshot = handlers.snapshot(kind);
    trace!(event = %kind, handlers = snapshot.len(), "dispatching bridge event");
    for handler in &snapshot {
        handler.call(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settle_completes_once() {
        let (sender, mut receiver) = oneshot::channel();
        let settle = Settle::new(sender);
        assert!(settle.complete(Err(BridgeError::SessionFailed {
            message: "first".into(),
        })));
        assert!(!settle.complete(Err(BridgeError::SessionFailed {
            message: "second".into(),
        })));
        let outcome = receiver.try_recv().expect("settled");
        assert_eq!(
            outcome.expect_err("failure").native_message(),
            Some("first")
        );
    }

    #[test]
    fn current_filters_stale_generations() {
        let mut state = BridgeState {
            active: Some(ActiveSession {
                id: SessionId::new("magnet:A").expect("session"),
                generation: 2,
                phase: SessionPhase::Idle,
                started: false,
                subscriptions: HashMap::new(),
                pending: None,
                span: Span::none(),
            }),
            generation: 2,
        };
        assert!(current(&mut state, 1).is_none());
        let active = current(&mut state, 2).expect("current session");
        assert!(active.advance(SessionPhase::Created));
        assert!(!active.advance(SessionPhase::Ready));
        assert_eq!(active.phase, SessionPhase::Created);
    }
}
