use serde_json::json;
use serial_test::serial;
use streamer_config::{
    BridgeConfig, ConfigError, LogOutput,
    defaults::{ENV_LOG_FORMAT, ENV_REMOVE_AFTER_STOP, ENV_SAVE_LOCATION},
};

struct EnvGuard(&'static [&'static str]);

impl EnvGuard {
    fn set(pairs: &[(&'static str, &str)], names: &'static [&'static str]) -> Self {
        for (name, value) in pairs {
            // SAFETY: tests touching the environment are serialised.
            unsafe { std::env::set_var(name, value) };
        }
        Self(names)
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for name in self.0 {
            // SAFETY: tests touching the environment are serialised.
            unsafe { std::env::remove_var(name) };
        }
    }
}

const NAMES: &[&str] = &[ENV_SAVE_LOCATION, ENV_REMOVE_AFTER_STOP, ENV_LOG_FORMAT];

#[test]
#[serial]
fn from_env_reads_process_environment() -> anyhow::Result<()> {
    let _guard = EnvGuard::set(
        &[
            (ENV_SAVE_LOCATION, "/srv/streams"),
            (ENV_REMOVE_AFTER_STOP, "no"),
            (ENV_LOG_FORMAT, "json"),
        ],
        NAMES,
    );
    let config = BridgeConfig::from_env()?;
    assert_eq!(config.default_save_location.as_deref(), Some("/srv/streams"));
    assert!(!config.remove_after_stop);
    assert_eq!(config.log_format, Some(LogOutput::Json));

    let options = config.start_options();
    assert_eq!(options.save_location.as_deref(), Some("/srv/streams"));
    assert!(!options.remove_after_stop);
    Ok(())
}

#[test]
#[serial]
fn from_env_rejects_unknown_log_format() {
    let _guard = EnvGuard::set(&[(ENV_LOG_FORMAT, "xml")], NAMES);
    let err = BridgeConfig::from_env().expect_err("xml is unsupported");
    assert!(matches!(err, ConfigError::InvalidField { ref field, .. } if field == "log_format"));
}

#[test]
#[serial]
fn from_env_without_variables_matches_defaults() -> anyhow::Result<()> {
    let _guard = EnvGuard::set(&[], NAMES);
    assert_eq!(BridgeConfig::from_env()?, BridgeConfig::default());
    Ok(())
}

#[test]
fn json_document_round_trips_through_serde() -> anyhow::Result<()> {
    let config = BridgeConfig::from_json(&json!({
        "default_save_location": "/tmp/cache",
        "log_format": "json"
    }))?;
    let encoded = serde_json::to_value(&config)?;
    assert_eq!(encoded["log_format"], "json");
    assert_eq!(BridgeConfig::from_json(&encoded)?, config);
    Ok(())
}
