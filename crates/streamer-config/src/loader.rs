//! Environment-driven configuration loading.
//!
//! # Design
//! - Variables are read through a lookup closure so tests need not touch the process environment.
//! - Flags accept `1|true|yes|on` and `0|false|no|off`; anything else is rejected.
//! - Blank values are treated as unset.

use tracing::debug;

use crate::defaults::{
    BRIDGE_SECTION, ENV_AUTO_SELECT_LARGEST, ENV_LOG_FORMAT, ENV_LOG_LEVEL,
    ENV_REMOVE_AFTER_STOP, ENV_SAVE_LOCATION,
};
use crate::error::{ConfigError, ConfigResult};
use crate::model::{BridgeConfig, LogOutput};

pub(crate) fn load<F>(lookup: &F) -> ConfigResult<BridgeConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let read = |name: &str| {
        lookup(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    let mut config = BridgeConfig::default();
    if let Some(location) = read(ENV_SAVE_LOCATION) {
        config.default_save_location = Some(location);
    }
    if let Some(raw) = read(ENV_REMOVE_AFTER_STOP) {
        config.remove_after_stop = parse_flag(ENV_REMOVE_AFTER_STOP, &raw)?;
    }
    if let Some(raw) = read(ENV_AUTO_SELECT_LARGEST) {
        config.auto_select_largest = parse_flag(ENV_AUTO_SELECT_LARGEST, &raw)?;
    }
    if let Some(level) = read(ENV_LOG_LEVEL) {
        config.log_level = level;
    }
    if let Some(raw) = read(ENV_LOG_FORMAT) {
        config.log_format = Some(raw.parse::<LogOutput>()?);
    }

    debug!(
        remove_after_stop = config.remove_after_stop,
        auto_select_largest = config.auto_select_largest,
        "loaded bridge configuration from environment"
    );
    Ok(config)
}

/// Interpret a flag value.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the value is neither truthy nor falsey.
pub fn parse_flag(name: &str, value: &str) -> ConfigResult<bool> {
    env_flag_value(Some(value)).ok_or_else(|| {
        ConfigError::invalid(
            BRIDGE_SECTION,
            name,
            Some(value.to_string()),
            "expected a boolean flag",
        )
    })
}

fn env_flag_value(value: Option<&str>) -> Option<bool> {
    value.and_then(|v| match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    })
}
