use std::sync::{Arc, Mutex};

use streamer_bridge::{BridgeError, LegacyEvent, Torrent};
use streamer_core::FileIndex;
use streamer_events::{EventKind, NativeEventChannel};
use streamer_test_support::fixtures::{
    MAGNET_A, MAGNET_B, files_payload, ready_payload, status_payload,
};
use streamer_test_support::{NativeCall, RecordingNative};

fn torrent(magnet: &str, remove_after_stop: Option<bool>) -> (Arc<RecordingNative>, Torrent) {
    let channel = NativeEventChannel::new();
    let native = Arc::new(RecordingNative::new(channel.clone()));
    let torrent = Torrent::new(native.clone(), channel, magnet, None, remove_after_stop)
        .expect("valid magnet");
    (native, torrent)
}

#[test]
fn empty_magnet_is_rejected() {
    let channel = NativeEventChannel::new();
    let native = Arc::new(RecordingNative::new(channel.clone()));
    let err = Torrent::new(native, channel, "", None, None).expect_err("empty magnet");
    assert!(matches!(err, BridgeError::InvalidArgument { .. }));
}

#[test]
fn remove_after_stop_defaults_only_when_unspecified() {
    let (_, defaulted) = torrent(MAGNET_A, None);
    assert!(defaulted.remove_after_stop());
    let (_, explicit) = torrent(MAGNET_A, Some(false));
    assert!(!explicit.remove_after_stop());
    assert!(explicit.save_location().is_none());
}

#[tokio::test]
async fn start_creates_then_starts() -> anyhow::Result<()> {
    let channel = NativeEventChannel::new();
    let native = Arc::new(RecordingNative::new(channel.clone()));
    let torrent = Torrent::new(
        native.clone(),
        channel,
        MAGNET_A,
        Some("/tmp/legacy".into()),
        Some(false),
    )?;
    torrent.start().await?;
    assert_eq!(
        native.calls(),
        vec![
            NativeCall::CreateTorrent {
                session: MAGNET_A.to_string(),
                save_location: Some("/tmp/legacy".into()),
                remove_after_stop: false,
            },
            NativeCall::Start(MAGNET_A.to_string()),
        ]
    );
    Ok(())
}

#[test]
fn handlers_receive_payload_and_snapshot_for_any_kind() {
    let (native, torrent) = torrent(MAGNET_A, None);
    let seen: Arc<Mutex<Vec<LegacyEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let ready_sink = Arc::clone(&seen);
    let status_sink = Arc::clone(&seen);
    let _ = torrent
        .add_event_listener(EventKind::Ready, move |event| {
            ready_sink.lock().expect("seen").push(event.clone());
        })
        .add_event_listener_named("status", move |event| {
            status_sink.lock().expect("seen").push(event.clone());
        })
        .add_event_listener_named("buffering", |_| panic!("unknown kinds are ignored"));

    let _ = native.emit(EventKind::Progress, MAGNET_A, files_payload(MAGNET_A, 2));
    let _ = native.emit(EventKind::Status, MAGNET_A, status_payload(MAGNET_A, 0.4, 10, 1, 0.1));
    let _ = native.emit(
        EventKind::Ready,
        MAGNET_A,
        ready_payload(MAGNET_A, "http://x/1", "movie.mp4", 1000),
    );
    let _ = native.emit(EventKind::Status, MAGNET_B, status_payload(MAGNET_B, 0.4, 10, 1, 0.1));

    let seen = seen.lock().expect("seen");
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].kind, EventKind::Status);
    assert_eq!(seen[0].payload["progress"], "0.4");
    assert_eq!(seen[1].kind, EventKind::Ready);
    assert_eq!(seen[1].torrent.magnet_url, MAGNET_A);
    assert_eq!(seen[1].torrent.files.len(), 2);
    assert!(seen[1].torrent.remove_after_stop);
}

#[test]
fn first_file_list_is_kept_and_largest_selected() {
    let (native, torrent) = torrent(MAGNET_A, None);
    let _ = native.emit(EventKind::Progress, MAGNET_A, files_payload(MAGNET_A, 0));
    assert!(torrent.files().is_empty());
    let _ = native.emit(EventKind::Progress, MAGNET_A, files_payload(MAGNET_A, 2));
    let _ = native.emit(EventKind::Progress, MAGNET_A, files_payload(MAGNET_A, 5));

    assert_eq!(torrent.files().len(), 2);
    let selections = native
        .calls()
        .into_iter()
        .filter(|call| {
            *call
                == NativeCall::SetSelectedFileIndex {
                    session: MAGNET_A.to_string(),
                    index: -1,
                }
        })
        .count();
    assert_eq!(selections, 2);
}

#[test]
fn clear_events_detaches_everything() {
    let (native, torrent) = torrent(MAGNET_A, None);
    let _ = torrent.add_event_listener(EventKind::Stop, |_| panic!("cleared"));
    assert_eq!(torrent.listener_count(), 2);

    torrent.clear_events();
    assert_eq!(torrent.listener_count(), 0);
    assert_eq!(native.channel().total_listeners(), 0);
    assert_eq!(native.emit(EventKind::Progress, MAGNET_A, files_payload(MAGNET_A, 1)), 0);
    assert!(torrent.files().is_empty());
}

#[test]
fn stop_and_selection_forward_to_native() -> anyhow::Result<()> {
    let (native, torrent) = torrent(MAGNET_A, None);
    torrent.set_selected_file_index(FileIndex::Index(1))?;
    torrent.stop()?;

    assert_eq!(
        native.calls(),
        vec![
            NativeCall::SetSelectedFileIndex {
                session: MAGNET_A.to_string(),
                index: 1,
            },
            NativeCall::Stop(MAGNET_A.to_string()),
        ]
    );
    assert_eq!(torrent.listener_count(), 1);
    Ok(())
}

#[tokio::test]
async fn destroy_stops_a_running_torrent_before_releasing_it() -> anyhow::Result<()> {
    let (native, torrent) = torrent(MAGNET_A, None);
    torrent.start().await?;
    native.clear_calls();

    torrent.destroy()?;

    assert_eq!(
        native.calls(),
        vec![
            NativeCall::Stop(MAGNET_A.to_string()),
            NativeCall::Destroy(MAGNET_A.to_string()),
        ]
    );
    assert_eq!(torrent.listener_count(), 0);
    assert_eq!(native.channel().total_listeners(), 0);
    Ok(())
}

#[test]
fn torrents_are_independent() {
    let channel = NativeEventChannel::new();
    let native = Arc::new(RecordingNative::new(channel.clone()));
    let first = Torrent::new(native.clone(), channel.clone(), MAGNET_A, None, None).expect("a");
    let second = Torrent::new(native.clone(), channel, MAGNET_B, None, None).expect("b");

    let _ = native.emit(EventKind::Progress, MAGNET_B, files_payload(MAGNET_B, 3));
    assert!(first.files().is_empty());
    assert_eq!(second.files().len(), 3);

    first.clear_events();
    assert_eq!(native.channel().total_listeners(), 1);
}
