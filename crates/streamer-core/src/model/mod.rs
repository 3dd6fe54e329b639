//! Streaming session DTOs shared by the bridge and its callers.

use serde::{Deserialize, Serialize};
use streamer_events::EventKind;

/// Native sentinel meaning "select the largest file in the torrent".
pub const LARGEST_FILE_SENTINEL: i32 = -1;

/// Options accepted when starting a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StartOptions {
    /// Directory the native module downloads into; `None` uses its cache directory.
    pub save_location: Option<String>,
    /// Whether the native module deletes downloaded data once the stream stops.
    pub remove_after_stop: bool,
}

impl Default for StartOptions {
    fn default() -> Self {
        Self {
            save_location: None,
            remove_after_stop: true,
        }
    }
}

impl StartOptions {
    /// Override the save location.
    #[must_use]
    pub fn with_save_location(mut self, location: impl Into<String>) -> Self {
        self.save_location = Some(location.into());
        self
    }

    /// Override whether data is removed after stop.
    #[must_use]
    pub const fn with_remove_after_stop(mut self, remove: bool) -> Self {
        self.remove_after_stop = remove;
        self
    }
}

/// Stream location produced once a session is ready.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResult {
    /// HTTP URL serving the selected file.
    pub url: String,
    /// Display name of the torrent payload.
    pub file_name: String,
    /// Size of the served file in bytes.
    pub file_size: u64,
}

/// Download status snapshot pushed repeatedly by the native module.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    /// Completion ratio of the selected file, `0.0..=1.0`.
    pub progress: f64,
    /// Download throughput in bytes per second.
    pub download_rate: f64,
    /// Connected seeds.
    pub num_seeds: u32,
    /// Streaming buffer fill ratio, `0.0..=1.0`.
    pub buffer: f64,
}

/// File entry reported by the native module once metadata is available.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    /// Position of the file within the torrent, when reported.
    pub index: Option<i64>,
    /// Absolute path the file is written to.
    pub path: Option<String>,
    /// File name without directories.
    pub file_name: Option<String>,
    /// File size in bytes.
    pub size: Option<u64>,
}

/// Lifecycle progress notification; carries the file list once discovered.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    /// Session the update belongs to.
    pub magnet_url: Option<String>,
    /// Files in the torrent; empty until metadata is fetched.
    pub files: Vec<FileDescriptor>,
    /// Free-form lifecycle marker emitted by the native module.
    pub data: Option<String>,
}

/// Failure reported by the native module.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorNotice {
    /// Session the failure belongs to.
    pub magnet_url: Option<String>,
    /// Native error message.
    pub msg: String,
}

/// Stream stopped notification.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopNotice {
    /// Session that stopped.
    pub magnet_url: Option<String>,
    /// Native stop message.
    pub msg: String,
}

/// Normalised event delivered to bridge listeners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeEvent {
    /// Periodic download status.
    Status(StatusSnapshot),
    /// Native failure.
    Error(ErrorNotice),
    /// Stream stopped.
    Stop(StopNotice),
    /// Lifecycle progress.
    Progress(ProgressUpdate),
    /// Stream ready.
    Ready(SessionResult),
}

impl BridgeEvent {
    /// Kind of the native event this value was produced from.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Status(_) => EventKind::Status,
            Self::Error(_) => EventKind::Error,
            Self::Stop(_) => EventKind::Stop,
            Self::Progress(_) => EventKind::Progress,
            Self::Ready(_) => EventKind::Ready,
        }
    }
}

/// File selection passed to the native module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileIndex {
    /// Let the native module pick the largest file.
    #[default]
    Largest,
    /// Explicit file position within the torrent.
    Index(u32),
}

impl FileIndex {
    /// Integer understood by the native module.
    #[must_use]
    pub fn as_native(self) -> i32 {
        match self {
            Self::Largest => LARGEST_FILE_SENTINEL,
            Self::Index(index) => i32::try_from(index).unwrap_or(i32::MAX),
        }
    }

    /// Interpret a native integer; negative values select the largest file.
    #[must_use]
    pub fn from_native(value: i64) -> Self {
        u32::try_from(value).map_or(Self::Largest, Self::Index)
    }
}

/// Lifecycle of a bridged session.
///
/// `Idle → Created → Started → Ready | Failed`; any phase may fall back to
/// `Idle` when the session is stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No native session has been created.
    #[default]
    Idle,
    /// `createTorrent` succeeded.
    Created,
    /// `start` was issued; awaiting `ready` or `error`.
    Started,
    /// The stream URL was delivered.
    Ready,
    /// The session failed before becoming ready.
    Failed,
}

impl SessionPhase {
    /// Whether moving from `self` to `next` is a legal transition.
    #[must_use]
    pub const fn can_advance(self, next: Self) -> bool {
        matches!(
            (self, next),
            (_, Self::Idle)
                | (Self::Idle, Self::Created | Self::Failed)
                | (Self::Created, Self::Started | Self::Failed)
                | (Self::Started, Self::Ready | Self::Failed)
        )
    }

    /// Lowercase name used in logs and spans.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Created => "created",
            Self::Started => "started",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }

    /// Whether the start handshake has settled.
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Ready | Self::Failed)
    }
}
