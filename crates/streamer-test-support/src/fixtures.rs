//! Magnet identifiers and native payload builders shaped like the real module's output.

use serde_json::{Value, json};

/// Primary magnet identifier used across suites.
pub const MAGNET_A: &str = "magnet:?xt=urn:btih:0123456789abcdef0123456789abcdef01234567&dn=alpha";

/// Secondary magnet identifier for preemption scenarios.
pub const MAGNET_B: &str = "magnet:?xt=urn:btih:89abcdef0123456789abcdef0123456789abcdef&dn=beta";

/// `ready` payload as emitted once the HTTP server serves the file.
#[must_use]
pub fn ready_payload(magnet: &str, url: &str, file_name: &str, file_size: u64) -> Value {
    json!({
        "magnetUrl": magnet,
        "url": url,
        "fileName": file_name,
        "fileSize": file_size,
    })
}

/// `error` payload carrying the native message.
#[must_use]
pub fn error_payload(magnet: &str, msg: &str) -> Value {
    json!({ "magnetUrl": magnet, "msg": msg })
}

/// `stop` payload as emitted when the stream halts.
#[must_use]
pub fn stop_payload(magnet: &str) -> Value {
    json!({ "magnetUrl": magnet, "msg": "OnStreamStoped" })
}

/// `status` payload; the native module stringifies every number.
#[must_use]
pub fn status_payload(magnet: &str, progress: f64, speed: u64, seeds: u32, buffer: f64) -> Value {
    json!({
        "magnetUrl": magnet,
        "progress": progress.to_string(),
        "downloadSpeed": speed.to_string(),
        "seeds": seeds.to_string(),
        "buffer": buffer.to_string(),
    })
}

/// `progress` payload listing `count` files, as emitted once metadata arrives.
#[must_use]
pub fn files_payload(magnet: &str, count: usize) -> Value {
    let files: Vec<Value> = (0..count)
        .map(|index| {
            json!({
                "index": index,
                "path": format!("/downloads/file-{index}.mkv"),
                "fileName": format!("file-{index}.mkv"),
                "size": (index + 1) * 1_024,
            })
        })
        .collect();
    json!({ "magnetUrl": magnet, "files": files, "data": "onStreamStarted" })
}
