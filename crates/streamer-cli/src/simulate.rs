//! Scripted stand-in for the platform streaming module.
//!
//! # Design
//! - Each started session runs a tokio task that emits a file list, a series
//!   of status ticks, then `ready` (or `error` when a failure is scripted).
//! - Payloads mirror the native wire shape, numbers included as strings.
//! - Session state is never locked while emitting so bridge handlers may call
//!   back into the module.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{Context, bail};
use async_trait::async_trait;
use serde_json::{Value, json};
use streamer_core::{EventKind, FileIndex, LARGEST_FILE_SENTINEL, NativeModule, SessionId};
use streamer_events::{ChannelKey, NativeEventChannel};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info};

pub(crate) const STREAM_BASE_URL: &str = "http://127.0.0.1:8080/stream";
const STOP_MESSAGE: &str = "OnStreamStoped";
const STARTED_MARKER: &str = "onStreamStarted";
const DEFAULT_DOWNLOAD_RATE: u64 = 1_572_864;

/// File the simulated torrent contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SimulatedFile {
    pub(crate) path: String,
    pub(crate) size: u64,
}

impl SimulatedFile {
    fn new(path: &str, size: u64) -> Self {
        Self {
            path: path.to_string(),
            size,
        }
    }

    fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Script followed by every simulated session.
#[derive(Debug, Clone)]
pub(crate) struct SimulationPlan {
    pub(crate) tick: Duration,
    pub(crate) ticks: u32,
    pub(crate) files: Vec<SimulatedFile>,
    pub(crate) failure: Option<String>,
    pub(crate) download_rate: u64,
}

impl SimulationPlan {
    pub(crate) fn new(tick: Duration, ticks: u32, failure: Option<String>) -> Self {
        Self {
            tick,
            ticks: ticks.max(1),
            files: vec![
                SimulatedFile::new("sample/trailer.mp4", 52_428_800),
                SimulatedFile::new("sample/feature.mkv", 1_610_612_736),
                SimulatedFile::new("sample/feature.en.srt", 48_128),
            ],
            failure,
            download_rate: DEFAULT_DOWNLOAD_RATE,
        }
    }

    fn largest(&self) -> Option<usize> {
        self.files
            .iter()
            .enumerate()
            .max_by_key(|(_, file)| file.size)
            .map(|(index, _)| index)
    }

    fn resolve(&self, selected: i32) -> Option<usize> {
        match FileIndex::from_native(i64::from(selected)) {
            FileIndex::Largest => self.largest(),
            FileIndex::Index(index) => usize::try_from(index)
                .ok()
                .filter(|index| *index < self.files.len())
                .or_else(|| self.largest()),
        }
    }
}

#[derive(Debug)]
struct SimulatedSession {
    selected: i32,
    task: Option<JoinHandle<()>>,
}

#[derive(Debug)]
struct Shared {
    channel: NativeEventChannel,
    plan: SimulationPlan,
    sessions: Mutex<HashMap<SessionId, SimulatedSession>>,
}

impl Shared {
    fn lock_sessions(&self) -> MutexGuard<'_, HashMap<SessionId, SimulatedSession>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, kind: EventKind, session: &SessionId, payload: Value) {
        let delivered = self
            .channel
            .emit(&ChannelKey::scoped(kind, session.clone()), payload);
        debug!(%session, event = %kind, delivered, "simulated event emitted");
    }

    fn selection(&self, session: &SessionId) -> i32 {
        self.lock_sessions()
            .get(session)
            .map_or(LARGEST_FILE_SENTINEL, |entry| entry.selected)
    }
}

/// Native module that plays back a [`SimulationPlan`] on the shared channel.
#[derive(Debug, Clone)]
pub(crate) struct SimulatedNative {
    shared: Arc<Shared>,
}

impl SimulatedNative {
    pub(crate) fn new(channel: NativeEventChannel, plan: SimulationPlan) -> Self {
        Self {
            shared: Arc::new(Shared {
                channel,
                plan,
                sessions: Mutex::new(HashMap::new()),
            }),
        }
    }

    fn take_session(&self, session: &SessionId) -> Option<SimulatedSession> {
        let removed = self.shared.lock_sessions().remove(session);
        if let Some(task) = removed.as_ref().and_then(|entry| entry.task.as_ref()) {
            task.abort();
        }
        removed
    }
}

#[async_trait]
impl NativeModule for SimulatedNative {
    async fn create_torrent(
        &self,
        session: &SessionId,
        save_location: Option<&str>,
        remove_after_stop: bool,
    ) -> anyhow::Result<()> {
        let previous = self.shared.lock_sessions().insert(
            session.clone(),
            SimulatedSession {
                selected: LARGEST_FILE_SENTINEL,
                task: None,
            },
        );
        if let Some(task) = previous.and_then(|entry| entry.task) {
            task.abort();
        }
        info!(
            %session,
            save_location = save_location.unwrap_or("<default>"),
            remove_after_stop,
            "simulated torrent created"
        );
        Ok(())
    }

    fn start(&self, session: &SessionId) -> anyhow::Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .context("simulated sessions need a tokio runtime")?;
        let mut sessions = self.shared.lock_sessions();
        let Some(entry) = sessions.get_mut(session) else {
            bail!("session {session} was never created");
        };
        if entry.task.as_ref().is_some_and(|task| !task.is_finished()) {
            bail!("session {session} is already streaming");
        }
        entry.task = Some(runtime.spawn(play(Arc::clone(&self.shared), session.clone())));
        drop(sessions);
        info!(%session, "simulated session started");
        Ok(())
    }

    fn stop(&self, session: &SessionId) -> anyhow::Result<()> {
        if self.take_session(session).is_none() {
            debug!(%session, "stop for unknown simulated session");
            return Ok(());
        }
        self.shared.emit(
            EventKind::Stop,
            session,
            json!({"magnetUrl": session.as_str(), "msg": STOP_MESSAGE}),
        );
        Ok(())
    }

    fn destroy(&self, session: &SessionId) -> anyhow::Result<()> {
        let _ = self.take_session(session);
        Ok(())
    }

    fn set_selected_file_index(&self, session: &SessionId, index: i32) -> anyhow::Result<()> {
        if let Some(entry) = self.shared.lock_sessions().get_mut(session) {
            entry.selected = index;
            return Ok(());
        }
        bail!("session {session} was never created");
    }

    fn open(&self, url: &str, mime_type: &str) -> anyhow::Result<()> {
        info!(url, mime_type, "stream handed to viewer");
        Ok(())
    }
}

async fn play(shared: Arc<Shared>, session: SessionId) {
    let plan = &shared.plan;
    let mut ticker = interval(plan.tick);
    ticker.tick().await;

    let files: Vec<Value> = plan
        .files
        .iter()
        .enumerate()
        .map(|(index, file)| {
            json!({
                "index": index,
                "path": file.path,
                "fileName": file.file_name(),
                "size": file.size.to_string(),
            })
        })
        .collect();
    shared.emit(
        EventKind::Progress,
        &session,
        json!({"magnetUrl": session.as_str(), "files": files, "data": STARTED_MARKER}),
    );

    for step in 1..=plan.ticks {
        ticker.tick().await;
        let progress = f64::from(step) / f64::from(plan.ticks);
        shared.emit(
            EventKind::Status,
            &session,
            json!({
                "magnetUrl": session.as_str(),
                "progress": format!("{progress:.4}"),
                "downloadSpeed": plan.download_rate.to_string(),
                "seeds": (3 + step % 4).to_string(),
                "buffer": format!("{:.4}", (progress * 2.0).min(1.0)),
            }),
        );
    }

    if let Some(message) = &plan.failure {
        shared.emit(
            EventKind::Error,
            &session,
            json!({"magnetUrl": session.as_str(), "msg": message}),
        );
        return;
    }

    let selected = shared.selection(&session);
    match plan.resolve(selected) {
        Some(index) => {
            let file = &plan.files[index];
            shared.emit(
                EventKind::Ready,
                &session,
                json!({
                    "magnetUrl": session.as_str(),
                    "url": format!("{STREAM_BASE_URL}/{index}"),
                    "fileName": file.file_name(),
                    "fileSize": file.size.to_string(),
                }),
            );
        }
        None => shared.emit(
            EventKind::Error,
            &session,
            json!({"magnetUrl": session.as_str(), "msg": "torrent has no files"}),
        ),
    }
}
