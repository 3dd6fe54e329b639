//! Recording fake for the native streaming module.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::Value;
use streamer_core::NativeModule;
use streamer_events::{ChannelKey, EventKind, NativeEventChannel, SessionId};
use tokio::sync::{Notify, watch};

/// Native command observed by [`RecordingNative`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeCall {
    /// `createTorrent(session, saveLocation, removeAfterStop)`.
    CreateTorrent {
        /// Session identifier.
        session: String,
        /// Requested save location.
        save_location: Option<String>,
        /// Whether data is removed after stop.
        remove_after_stop: bool,
    },
    /// `start(session)`.
    Start(String),
    /// `stop(session)`.
    Stop(String),
    /// `destroy(session)`.
    Destroy(String),
    /// `setSelectedFileIndex(session, index)`.
    SetSelectedFileIndex {
        /// Session identifier.
        session: String,
        /// Requested file index.
        index: i32,
    },
    /// `open(url, type)`.
    Open {
        /// Stream URL.
        url: String,
        /// MIME type handed to the viewer.
        mime_type: String,
    },
}

impl NativeCall {
    /// Session the call targeted, if any.
    #[must_use]
    pub fn session(&self) -> Option<&str> {
        match self {
            Self::CreateTorrent { session, .. }
            | Self::Start(session)
            | Self::Stop(session)
            | Self::Destroy(session)
            | Self::SetSelectedFileIndex { session, .. } => Some(session),
            Self::Open { .. } => None,
        }
    }
}

/// In-memory native module that records every command and can replay
/// scripted events on the shared channel.
pub struct RecordingNative {
    channel: NativeEventChannel,
    calls: Mutex<Vec<NativeCall>>,
    on_start: Mutex<Vec<(EventKind, Value)>>,
    on_create: Mutex<Vec<(EventKind, Value)>>,
    create_failure: Mutex<Option<String>>,
    start_failure: Mutex<Option<String>>,
    held_create: Mutex<Option<Arc<Notify>>>,
    stop_notices: AtomicBool,
    call_count: watch::Sender<usize>,
}

impl RecordingNative {
    /// Construct a fake that emits on `channel`.
    #[must_use]
    pub fn new(channel: NativeEventChannel) -> Self {
        let (call_count, _) = watch::channel(0);
        Self {
            channel,
            calls: Mutex::new(Vec::new()),
            on_start: Mutex::new(Vec::new()),
            on_create: Mutex::new(Vec::new()),
            create_failure: Mutex::new(None),
            start_failure: Mutex::new(None),
            held_create: Mutex::new(None),
            stop_notices: AtomicBool::new(false),
            call_count,
        }
    }

    /// Channel the fake emits on.
    #[must_use]
    pub const fn channel(&self) -> &NativeEventChannel {
        &self.channel
    }

    /// Snapshot of recorded commands, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<NativeCall> {
        lock(&self.calls).clone()
    }

    /// Forget recorded commands.
    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    /// Emit `payload` scoped to the started session each time `start` is called.
    pub fn script_on_start(&self, kind: EventKind, payload: Value) {
        lock(&self.on_start).push((kind, payload));
    }

    /// Emit `payload` scoped to the created session while `createTorrent` is in flight.
    pub fn script_on_create(&self, kind: EventKind, payload: Value) {
        lock(&self.on_create).push((kind, payload));
    }

    /// Make the next `createTorrent` calls fail with `message`.
    pub fn fail_create(&self, message: impl Into<String>) {
        *lock(&self.create_failure) = Some(message.into());
    }

    /// Make the next `start` calls fail with `message`.
    pub fn fail_start(&self, message: impl Into<String>) {
        *lock(&self.start_failure) = Some(message.into());
    }

    /// Hold the next `createTorrent` call until the returned gate is notified.
    #[must_use]
    pub fn hold_next_create(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *lock(&self.held_create) = Some(Arc::clone(&gate));
        gate
    }

    /// Emit a `stop` notice synchronously whenever `stop` is called.
    pub fn emit_stop_notices(&self, enabled: bool) {
        self.stop_notices.store(enabled, Ordering::SeqCst);
    }

    /// Emit `payload` on the channel scoped to `session`.
    ///
    /// # Panics
    ///
    /// Panics if `session` is empty.
    #[must_use]
    pub fn emit(&self, kind: EventKind, session: &str, payload: Value) -> usize {
        let session = SessionId::new(session).expect("fixture session ids are non-empty");
        self.channel.emit(&ChannelKey::scoped(kind, session), payload)
    }

    /// Wait until a recorded command satisfies `predicate`.
    pub async fn wait_for_call<P>(&self, predicate: P)
    where
        P: Fn(&NativeCall) -> bool,
    {
        let mut rx = self.call_count.subscribe();
        let _ = rx
            .wait_for(|_| lock(&self.calls).iter().any(&predicate))
            .await;
    }

    fn replay(&self, script: &Mutex<Vec<(EventKind, Value)>>, session: &SessionId) {
        let script = lock(script).clone();
        for (kind, payload) in script {
            let _ = self
                .channel
                .emit(&ChannelKey::scoped(kind, session.clone()), payload);
        }
    }

    fn record(&self, call: NativeCall) {
        let count = {
            let mut calls = lock(&self.calls);
            calls.push(call);
            calls.len()
        };
        self.call_count.send_replace(count);
    }
}

#[async_trait]
impl NativeModule for RecordingNative {
    async fn create_torrent(
        &self,
        session: &SessionId,
        save_location: Option<&str>,
        remove_after_stop: bool,
    ) -> anyhow::Result<()> {
        self.record(NativeCall::CreateTorrent {
            session: session.to_string(),
            save_location: save_location.map(str::to_string),
            remove_after_stop,
        });
        self.replay(&self.on_create, session);
        let gate = lock(&self.held_create).take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        match lock(&self.create_failure).clone() {
            Some(message) => Err(anyhow!(message)),
            None => Ok(()),
        }
    }

    fn start(&self, session: &SessionId) -> anyhow::Result<()> {
        self.record(NativeCall::Start(session.to_string()));
        if let Some(message) = lock(&self.start_failure).clone() {
            return Err(anyhow!(message));
        }
        self.replay(&self.on_start, session);
        Ok(())
    }

    fn stop(&self, session: &SessionId) -> anyhow::Result<()> {
        self.record(NativeCall::Stop(session.to_string()));
        if self.stop_notices.load(Ordering::SeqCst) {
            let _ = self.channel.emit(
                &ChannelKey::scoped(EventKind::Stop, session.clone()),
                crate::fixtures::stop_payload(session.as_str()),
            );
        }
        Ok(())
    }

    fn destroy(&self, session: &SessionId) -> anyhow::Result<()> {
        self.record(NativeCall::Destroy(session.to_string()));
        Ok(())
    }

    fn set_selected_file_index(&self, session: &SessionId, index: i32) -> anyhow::Result<()> {
        self.record(NativeCall::SetSelectedFileIndex {
            session: session.to_string(),
            index,
        });
        Ok(())
    }

    fn open(&self, url: &str, mime_type: &str) -> anyhow::Result<()> {
        self.record(NativeCall::Open {
            url: url.to_string(),
            mime_type: mime_type.to_string(),
        });
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
