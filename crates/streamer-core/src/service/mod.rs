//! Call contract implemented by the platform-native streaming module.

use anyhow::bail;
use async_trait::async_trait;
use streamer_events::SessionId;

/// Commands the native torrent-streaming module accepts.
///
/// Everything except [`NativeModule::create_torrent`] is fire-and-forget:
/// results arrive later as events on the shared native channel.
#[async_trait]
pub trait NativeModule: Send + Sync {
    /// Register a torrent session with the native engine.
    async fn create_torrent(
        &self,
        session: &SessionId,
        save_location: Option<&str>,
        remove_after_stop: bool,
    ) -> anyhow::Result<()>;

    /// Begin fetching metadata and streaming for a created session.
    fn start(&self, session: &SessionId) -> anyhow::Result<()>;

    /// Stop streaming and release the native session.
    fn stop(&self, session: &SessionId) -> anyhow::Result<()>;

    /// Forget a session without stopping it; default implementation reports lack of support.
    fn destroy(&self, session: &SessionId) -> anyhow::Result<()> {
        let _ = session;
        bail!("destroy not supported by this native module");
    }

    /// Choose which file in the torrent is streamed (`-1` picks the largest).
    fn set_selected_file_index(&self, session: &SessionId, index: i32) -> anyhow::Result<()>;

    /// Hand a stream URL to an external viewer; default implementation reports lack of support.
    fn open(&self, url: &str, mime_type: &str) -> anyhow::Result<()> {
        let _ = (url, mime_type);
        bail!("open not supported by this native module");
    }
}
