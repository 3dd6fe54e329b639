//! Conversions between native event payloads and bridge events.
//!
//! The native module serialises most numbers as strings; every numeric
//! field is therefore accepted either as a JSON number or a numeric string.

use serde_json::Value;
use streamer_core::{
    BridgeEvent, ErrorNotice, FileDescriptor, ProgressUpdate, SessionResult, StatusSnapshot,
    StopNotice,
};
use streamer_events::EventKind;

use crate::error::{BridgeError, BridgeResult};

/// Decode a native payload for `kind` into a bridge event.
///
/// # Errors
///
/// Returns [`BridgeError::MalformedPayload`] when a `ready` payload carries no
/// usable stream URL. Other kinds fall back to defaults for missing fields.
pub fn normalize(kind: EventKind, payload: &Value) -> BridgeResult<BridgeEvent> {
    Ok(match kind {
        EventKind::Status => BridgeEvent::Status(status_from_payload(payload)),
        EventKind::Error => BridgeEvent::Error(ErrorNotice {
            magnet_url: string_field(payload, "magnetUrl"),
            msg: message(payload),
        }),
        EventKind::Stop => BridgeEvent::Stop(StopNotice {
            magnet_url: string_field(payload, "magnetUrl"),
            msg: message(payload),
        }),
        EventKind::Progress => BridgeEvent::Progress(progress_from_payload(payload)),
        EventKind::Ready => BridgeEvent::Ready(ready_from_payload(payload)?),
    })
}

/// Resolve a native event name such as `status` to its kind.
///
/// # Errors
///
/// Returns [`BridgeError::UnknownEventKind`] for names outside the known kinds.
pub fn event_kind(name: &str) -> BridgeResult<EventKind> {
    name.parse().map_err(|_| BridgeError::UnknownEventKind {
        name: name.to_owned(),
    })
}

/// Coerce a `status` payload; missing or unparsable fields become zero.
#[must_use]
pub fn status_from_payload(payload: &Value) -> StatusSnapshot {
    StatusSnapshot {
        progress: number(payload.get("progress")).clamp(0.0, 1.0),
        download_rate: number(payload.get("downloadSpeed")).max(0.0),
        num_seeds: count(payload.get("seeds")),
        buffer: number(payload.get("buffer")).clamp(0.0, 1.0),
    }
}

/// Decode a `progress` payload, keeping whichever file fields are present.
#[must_use]
pub fn progress_from_payload(payload: &Value) -> ProgressUpdate {
    let files = payload
        .get("files")
        .and_then(Value::as_array)
        .map(|files| files.iter().map(file_from_value).collect())
        .unwrap_or_default();
    let data = match payload.get("data") {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text.clone()),
        Some(other) => Some(other.to_string()),
    };
    ProgressUpdate {
        magnet_url: string_field(payload, "magnetUrl"),
        files,
        data,
    }
}

/// Decode a `ready` payload.
///
/// # Errors
///
/// Returns [`BridgeError::MalformedPayload`] when `url` is missing or blank.
pub fn ready_from_payload(payload: &Value) -> BridgeResult<SessionResult> {
    let url = string_field(payload, "url")
        .filter(|url| !url.trim().is_empty())
        .ok_or(BridgeError::MalformedPayload {
            kind: EventKind::Ready,
            reason: "ready payload has no url",
        })?;
    Ok(SessionResult {
        url,
        file_name: string_field(payload, "fileName").unwrap_or_default(),
        file_size: unsigned(payload.get("fileSize")).unwrap_or(0),
    })
}

fn file_from_value(value: &Value) -> FileDescriptor {
    FileDescriptor {
        index: value.get("index").and_then(signed),
        path: string_field(value, "path"),
        file_name: string_field(value, "fileName"),
        size: unsigned(value.get("size")),
    }
}

fn message(payload: &Value) -> String {
    match payload.get("msg") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

fn string_field(payload: &Value, field: &str) -> Option<String> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn number(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|value| value.is_finite()).unwrap_or(0.0)
}

fn count(value: Option<&Value>) -> u32 {
    unsigned(value).map_or(0, |count| u32::try_from(count).unwrap_or(u32::MAX))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn unsigned(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(number) => number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|value| value.is_finite() && *value >= 0.0)
                .map(|value| value.trunc() as u64)
        }),
        Value::String(text) => {
            let text = text.trim();
            text.parse::<u64>().ok().or_else(|| {
                text.parse::<f64>()
                    .ok()
                    .filter(|value| value.is_finite() && *value >= 0.0)
                    .map(|value| value.trunc() as u64)
            })
        }
        _ => None,
    }
}

fn signed(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_strings_are_coerced() {
        let status = status_from_payload(&json!({
            "progress": "0.5",
            "downloadSpeed": "2048",
            "seeds": "3",
            "buffer": "0.2"
        }));
        assert_eq!(
            status,
            StatusSnapshot {
                progress: 0.5,
                download_rate: 2048.0,
                num_seeds: 3,
                buffer: 0.2,
            }
        );
    }

    #[test]
    fn status_defaults_and_clamps() {
        let status = status_from_payload(&json!({
            "progress": 1.7,
            "downloadSpeed": "-5",
            "seeds": "many",
            "buffer": "NaN"
        }));
        assert!((status.progress - 1.0).abs() < f64::EPSILON);
        assert!(status.download_rate.abs() < f64::EPSILON);
        assert_eq!(status.num_seeds, 0);
        assert!(status.buffer.abs() < f64::EPSILON);

        assert_eq!(status_from_payload(&json!({})), StatusSnapshot::default());
    }

    #[test]
    fn ready_requires_url() {
        let result = ready_from_payload(&json!({
            "url": "http://x/1",
            "fileName": "movie.mp4",
            "fileSize": 1000
        }))
        .expect("ready payload");
        assert_eq!(
            result,
            SessionResult {
                url: "http://x/1".into(),
                file_name: "movie.mp4".into(),
                file_size: 1000,
            }
        );

        let err = ready_from_payload(&json!({"fileName": "movie.mp4"})).expect_err("no url");
        assert!(matches!(
            err,
            BridgeError::MalformedPayload {
                kind: EventKind::Ready,
                ..
            }
        ));
    }

    #[test]
    fn ready_accepts_string_sizes() {
        let result =
            ready_from_payload(&json!({"url": "http://x/2", "fileSize": "4096"})).expect("ready");
        assert_eq!(result.file_size, 4096);
        assert_eq!(result.file_name, "");
    }

    #[test]
    fn progress_reads_files_with_optional_fields() {
        let update = progress_from_payload(&json!({
            "magnetUrl": "magnet:A",
            "files": [
                {"index": 0, "path": "/t/a.mkv", "fileName": "a.mkv", "size": "100"},
                {"index": "1"},
                "garbage"
            ],
            "data": "onStreamStarted"
        }));
        assert_eq!(update.magnet_url.as_deref(), Some("magnet:A"));
        assert_eq!(update.files.len(), 3);
        assert_eq!(update.files[0].size, Some(100));
        assert_eq!(update.files[0].file_name.as_deref(), Some("a.mkv"));
        assert_eq!(update.files[1].index, Some(1));
        assert_eq!(update.files[2], FileDescriptor::default());
        assert_eq!(update.data.as_deref(), Some("onStreamStarted"));
    }

    #[test]
    fn notices_keep_native_message() {
        let event = normalize(EventKind::Error, &json!({"msg": "no peers"})).expect("error");
        assert_eq!(
            event,
            BridgeEvent::Error(ErrorNotice {
                magnet_url: None,
                msg: "no peers".into(),
            })
        );
        let event = normalize(EventKind::Stop, &json!({"magnetUrl": "m", "msg": "OnStreamStoped"}))
            .expect("stop");
        assert_eq!(event.kind(), EventKind::Stop);
    }

    #[test]
    fn event_names_resolve_or_report_unknown_kind() {
        assert_eq!(event_kind("status").expect("known"), EventKind::Status);
        assert_eq!(event_kind("ready").expect("known"), EventKind::Ready);

        let err = event_kind("buffering").expect_err("unknown");
        assert!(matches!(
            err,
            BridgeError::UnknownEventKind { ref name } if name == "buffering"
        ));
        assert_eq!(err.to_string(), "unknown event kind");
    }
}
