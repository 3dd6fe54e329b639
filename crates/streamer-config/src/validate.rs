//! Validation helpers for JSON configuration documents.

use serde_json::{Map, Value};

use crate::defaults::BRIDGE_SECTION;
use crate::error::{ConfigError, ConfigResult};
use crate::model::{BridgeConfig, LogOutput};

const KNOWN_FIELDS: [&str; 5] = [
    "default_save_location",
    "remove_after_stop",
    "auto_select_largest",
    "log_level",
    "log_format",
];

pub(crate) fn bridge_config_from_json(document: &Value) -> ConfigResult<BridgeConfig> {
    let map = document.as_object().ok_or_else(|| {
        ConfigError::invalid(
            BRIDGE_SECTION,
            "<root>",
            Some(document.to_string()),
            "expected an object",
        )
    })?;
    ensure_known_fields(map)?;

    let mut config = BridgeConfig::default();
    if let Some(value) = map.get("default_save_location") {
        config.default_save_location = parse_optional_string(value, "default_save_location")?;
    }
    if let Some(value) = map.get("remove_after_stop") {
        config.remove_after_stop = parse_bool(value, "remove_after_stop")?;
    }
    if let Some(value) = map.get("auto_select_largest") {
        config.auto_select_largest = parse_bool(value, "auto_select_largest")?;
    }
    if let Some(value) = map.get("log_level") {
        config.log_level = parse_optional_string(value, "log_level")?.ok_or_else(|| {
            ConfigError::invalid(BRIDGE_SECTION, "log_level", None, "must not be empty")
        })?;
    }
    if let Some(value) = map.get("log_format") {
        config.log_format = parse_optional_string(value, "log_format")?
            .map(|raw| raw.parse::<LogOutput>())
            .transpose()?;
    }
    Ok(config)
}

fn ensure_known_fields(map: &Map<String, Value>) -> ConfigResult<()> {
    match map.keys().find(|key| !KNOWN_FIELDS.contains(&key.as_str())) {
        Some(field) => Err(ConfigError::UnknownField {
            section: BRIDGE_SECTION.to_string(),
            field: field.clone(),
        }),
        None => Ok(()),
    }
}

fn parse_bool(value: &Value, field: &str) -> ConfigResult<bool> {
    value.as_bool().ok_or_else(|| {
        ConfigError::invalid(
            BRIDGE_SECTION,
            field,
            Some(value.to_string()),
            "expected a boolean",
        )
    })
}

/// `null` and blank strings decode to `None`.
fn parse_optional_string(value: &Value, field: &str) -> ConfigResult<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(raw) => {
            let trimmed = raw.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        other => Err(ConfigError::invalid(
            BRIDGE_SECTION,
            field,
            Some(other.to_string()),
            "expected a string",
        )),
    }
}
