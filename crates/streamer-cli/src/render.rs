//! Formatting helpers for session output.

use streamer_core::{ProgressUpdate, SessionResult, StatusSnapshot};
use streamer_events::NativeEnvelope;

const BYTE_UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
const UNIT_STEP: f64 = 1024.0;

/// Human readable size with up to two decimals and binary multiples, capped at GB.
pub(crate) fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes_to_f64(bytes);
    let mut unit = 0;
    while value >= UNIT_STEP && unit < BYTE_UNITS.len() - 1 {
        value /= UNIT_STEP;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{rounded} {}", BYTE_UNITS[unit])
}

/// Download rate rendered as `<size>/s`.
pub(crate) fn format_rate(bytes_per_second: f64) -> String {
    format!("{}/s", format_bytes(whole_bytes(bytes_per_second)))
}

pub(crate) fn status_line(status: &StatusSnapshot) -> String {
    format!(
        "progress {:.2}% | {} | seeds {} | buffer {:.1}%",
        status.progress * 100.0,
        format_rate(status.download_rate),
        status.num_seeds,
        status.buffer * 100.0
    )
}

pub(crate) fn files_line(update: &ProgressUpdate) -> String {
    let total: u64 = update.files.iter().filter_map(|file| file.size).sum();
    format!(
        "metadata: {} file(s), {}",
        update.files.len(),
        format_bytes(total)
    )
}

pub(crate) fn ready_lines(result: &SessionResult) -> Vec<String> {
    vec![
        "stream ready".to_string(),
        format!("url: {}", result.url),
        format!("file: {}", result.file_name),
        format!("size: {}", format_bytes(result.file_size)),
    ]
}

pub(crate) fn envelope_line(envelope: &NativeEnvelope) -> String {
    format!(
        "#{} {} {} {}",
        envelope.id, envelope.timestamp, envelope.key, envelope.payload
    )
}

fn bytes_to_f64(value: u64) -> f64 {
    let high = u32::try_from(value >> 32).unwrap_or(u32::MAX);
    let low = u32::try_from(value & 0xFFFF_FFFF).unwrap_or(u32::MAX);
    f64::from(high) * 4_294_967_296.0 + f64::from(low)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole_bytes(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.trunc() as u64
    } else {
        0
    }
}
