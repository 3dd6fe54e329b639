//! Typed bridge configuration.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use streamer_core::StartOptions;

use crate::defaults::{
    BRIDGE_SECTION, DEFAULT_AUTO_SELECT_LARGEST, DEFAULT_LOG_LEVEL, DEFAULT_REMOVE_AFTER_STOP,
};
use crate::error::{ConfigError, ConfigResult};
use crate::loader;
use crate::validate;

/// Log output selection carried by the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    /// Structured JSON lines.
    Json,
    /// Human-readable output.
    Pretty,
}

impl LogOutput {
    /// Lowercase name used in configuration documents.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Pretty => "pretty",
        }
    }
}

impl Display for LogOutput {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogOutput {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            _ => Err(ConfigError::invalid(
                BRIDGE_SECTION,
                "log_format",
                Some(value.to_string()),
                "unsupported log format",
            )),
        }
    }
}

/// Configuration applied to every session started through the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Directory handed to the native module when a start call gives none.
    pub default_save_location: Option<String>,
    /// Whether the native module deletes downloaded data on stop.
    pub remove_after_stop: bool,
    /// Select the largest file automatically once the file list arrives.
    pub auto_select_largest: bool,
    /// Tracing level used when `RUST_LOG` is unset.
    pub log_level: String,
    /// Log output format; `None` lets the build profile decide.
    pub log_format: Option<LogOutput>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            default_save_location: None,
            remove_after_stop: DEFAULT_REMOVE_AFTER_STOP,
            auto_select_largest: DEFAULT_AUTO_SELECT_LARGEST,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_format: None,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from the process environment, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] when a variable holds a value
    /// that cannot be interpreted.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] when a variable holds a value
    /// that cannot be interpreted.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        loader::load(&lookup)
    }

    /// Validate and decode a JSON configuration document.
    ///
    /// Missing fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownField`] for unexpected keys and
    /// [`ConfigError::InvalidField`] for values of the wrong shape.
    pub fn from_json(document: &Value) -> ConfigResult<Self> {
        validate::bridge_config_from_json(document)
    }

    /// Start options derived from this configuration.
    #[must_use]
    pub fn start_options(&self) -> StartOptions {
        StartOptions {
            save_location: self.default_save_location.clone(),
            remove_after_stop: self.remove_after_stop,
        }
    }
}
