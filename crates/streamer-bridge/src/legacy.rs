//! Per-instance torrent wrapper predating [`crate::SessionBridge`].
//!
//! Each `Torrent` owns one magnet identifier and its own channel listeners;
//! several may stream concurrently. Handlers receive the raw native payload
//! together with a snapshot of the torrent.

use std::fmt::{self, Debug, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde::Serialize;
use serde_json::Value;
use streamer_core::{FileDescriptor, FileIndex, LARGEST_FILE_SENTINEL, NativeModule};
use streamer_events::{ChannelKey, EventKind, NativeEventChannel, NativeListener, SessionId};
use tracing::{debug, info, warn};

use crate::convert;
use crate::error::{BridgeError, BridgeResult};

/// Torrent state handed to legacy handlers alongside each payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TorrentSnapshot {
    /// Magnet identifier of the torrent.
    pub magnet_url: String,
    /// Requested save location.
    pub save_location: Option<String>,
    /// Whether data is removed after stop.
    pub remove_after_stop: bool,
    /// First non-empty file list reported by the native module.
    pub files: Vec<FileDescriptor>,
}

/// Event delivered to legacy handlers.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyEvent {
    /// Kind of the native event.
    pub kind: EventKind,
    /// Payload exactly as emitted.
    pub payload: Value,
    /// Torrent state at delivery time.
    pub torrent: TorrentSnapshot,
}

/// One streaming torrent addressed by its magnet identifier.
pub struct Torrent {
    inner: Arc<TorrentInner>,
}

struct TorrentInner {
    native: Arc<dyn NativeModule>,
    channel: NativeEventChannel,
    magnet: SessionId,
    save_location: Option<String>,
    remove_after_stop: bool,
    files: Mutex<Vec<FileDescriptor>>,
    listeners: Mutex<Vec<NativeListener>>,
}

impl Torrent {
    /// Wrap `magnet`. `remove_after_stop` defaults to `true` when unspecified.
    ///
    /// A `progress` listener is attached immediately: it records the first
    /// non-empty file list and selects the largest file.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidArgument`] when `magnet` is empty.
    pub fn new(
        native: Arc<dyn NativeModule>,
        channel: NativeEventChannel,
        magnet: &str,
        save_location: Option<String>,
        remove_after_stop: Option<bool>,
    ) -> BridgeResult<Self> {
        let magnet = SessionId::new(magnet)
            .map_err(|_| BridgeError::InvalidArgument { field: "magnet_url" })?;
        let inner = Arc::new(TorrentInner {
            native,
            channel,
            magnet,
            save_location: save_location.filter(|location| !location.trim().is_empty()),
            remove_after_stop: remove_after_stop.unwrap_or(true),
            files: Mutex::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
        });

        let weak = Arc::downgrade(&inner);
        let listener = inner.channel.add_listener(
            ChannelKey::scoped(EventKind::Progress, inner.magnet.clone()),
            move |payload: &Value| {
                if let Some(inner) = weak.upgrade() {
                    inner.record_files(payload);
                }
            },
        );
        lock(&inner.listeners).push(listener);
        Ok(Self { inner })
    }

    /// Attach `handler` to `kind` for this torrent. Any kind is accepted,
    /// including `ready`.
    #[must_use]
    pub fn add_event_listener<F>(&self, kind: EventKind, handler: F) -> &Self
    where
        F: Fn(&LegacyEvent) + Send + Sync + 'static,
    {
        let weak: Weak<TorrentInner> = Arc::downgrade(&self.inner);
        let listener = self.inner.channel.add_listener(
            ChannelKey::scoped(kind, self.inner.magnet.clone()),
            move |payload: &Value| {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                handler(&LegacyEvent {
                    kind,
                    payload: payload.clone(),
                    torrent: inner.snapshot(),
                });
            },
        );
        lock(&self.inner.listeners).push(listener);
        self
    }

    /// Attach `handler` to the kind named `name`; unknown names are logged and ignored.
    #[must_use]
    pub fn add_event_listener_named<F>(&self, name: &str, handler: F) -> &Self
    where
        F: Fn(&LegacyEvent) + Send + Sync + 'static,
    {
        match convert::event_kind(name) {
            Ok(kind) => self.add_event_listener(kind, handler),
            Err(error) => {
                warn!(
                    error = %error,
                    event = name,
                    magnet = %self.inner.magnet,
                    "listener ignored"
                );
                self
            }
        }
    }

    /// Detach every listener this torrent attached, including the internal one.
    pub fn clear_events(&self) {
        let listeners = std::mem::take(&mut *lock(&self.inner.listeners));
        debug!(
            magnet = %self.inner.magnet,
            count = listeners.len(),
            "clearing torrent listeners"
        );
        drop(listeners);
    }

    /// Create the native torrent, then start it.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NativeCommand`] when either native call fails.
    pub async fn start(&self) -> BridgeResult<()> {
        let inner = &self.inner;
        info!(magnet = %inner.magnet, "creating native torrent");
        inner
            .native
            .create_torrent(
                &inner.magnet,
                inner.save_location.as_deref(),
                inner.remove_after_stop,
            )
            .await
            .map_err(|source| BridgeError::native("create_torrent", source))?;
        inner
            .native
            .start(&inner.magnet)
            .map_err(|source| BridgeError::native("start", source))
    }

    /// Stop the native torrent. Listeners stay attached.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NativeCommand`] when the native call fails.
    pub fn stop(&self) -> BridgeResult<()> {
        self.inner
            .native
            .stop(&self.inner.magnet)
            .map_err(|source| BridgeError::native("stop", source))
    }

    /// Detach every listener, stop the native stream, then release the torrent.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NativeCommand`] when a native call fails.
    pub fn destroy(&self) -> BridgeResult<()> {
        self.clear_events();
        self.stop()?;
        self.inner
            .native
            .destroy(&self.inner.magnet)
            .map_err(|source| BridgeError::native("destroy", source))
    }

    /// Choose the streamed file.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NativeCommand`] when the native call fails.
    pub fn set_selected_file_index(&self, index: FileIndex) -> BridgeResult<()> {
        self.inner
            .native
            .set_selected_file_index(&self.inner.magnet, index.as_native())
            .map_err(|source| BridgeError::native("set_selected_file_index", source))
    }

    /// Files recorded from the first non-empty `progress` event.
    #[must_use]
    pub fn files(&self) -> Vec<FileDescriptor> {
        lock(&self.inner.files).clone()
    }

    /// Magnet identifier of this torrent.
    #[must_use]
    pub fn magnet_url(&self) -> &SessionId {
        &self.inner.magnet
    }

    /// Requested save location.
    #[must_use]
    pub fn save_location(&self) -> Option<&str> {
        self.inner.save_location.as_deref()
    }

    /// Whether data is removed after stop.
    #[must_use]
    pub fn remove_after_stop(&self) -> bool {
        self.inner.remove_after_stop
    }

    /// Listeners currently attached by this torrent.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        lock(&self.inner.listeners).len()
    }

    /// Current torrent state.
    #[must_use]
    pub fn snapshot(&self) -> TorrentSnapshot {
        self.inner.snapshot()
    }
}

impl Debug for Torrent {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Torrent")
            .field("magnet", &self.inner.magnet)
            .field("save_location", &self.inner.save_location)
            .field("remove_after_stop", &self.inner.remove_after_stop)
            .field("listeners", &self.listener_count())
            .finish_non_exhaustive()
    }
}

impl TorrentInner {
    fn record_files(&self, payload: &Value) {
        let update = convert::progress_from_payload(payload);
        if update.files.is_empty() {
            return;
        }
        {
            let mut files = lock(&self.files);
            if files.is_empty() {
                *files = update.files;
            }
        }
        if let Err(error) = self
            .native
            .set_selected_file_index(&self.magnet, LARGEST_FILE_SENTINEL)
        {
            warn!(magnet = %self.magnet, error = %error, "native file selection failed");
        }
    }

    fn snapshot(&self) -> TorrentSnapshot {
        TorrentSnapshot {
            magnet_url: self.magnet.to_string(),
            save_location: self.save_location.clone(),
            remove_after_stop: self.remove_after_stop,
            files: lock(&self.files).clone(),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
