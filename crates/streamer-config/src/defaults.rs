//! Default values for the bridge configuration.

/// Section name used when reporting validation failures.
pub const BRIDGE_SECTION: &str = "bridge";
/// Whether downloaded data is removed when a session stops.
pub const DEFAULT_REMOVE_AFTER_STOP: bool = true;
/// Whether the largest file is selected once the file list is known.
pub const DEFAULT_AUTO_SELECT_LARGEST: bool = true;
/// Default tracing level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Environment variable holding the default save location.
pub const ENV_SAVE_LOCATION: &str = "STREAMER_SAVE_LOCATION";
/// Environment variable toggling removal of data on stop.
pub const ENV_REMOVE_AFTER_STOP: &str = "STREAMER_REMOVE_AFTER_STOP";
/// Environment variable toggling largest-file auto selection.
pub const ENV_AUTO_SELECT_LARGEST: &str = "STREAMER_AUTO_SELECT_LARGEST";
/// Environment variable holding the tracing level.
pub const ENV_LOG_LEVEL: &str = "STREAMER_LOG_LEVEL";
/// Environment variable holding the log output format.
pub const ENV_LOG_FORMAT: &str = "STREAMER_LOG_FORMAT";
