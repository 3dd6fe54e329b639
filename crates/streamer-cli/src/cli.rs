//! Argument parsing, configuration loading, and command dispatch.

use std::fmt::{self, Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use streamer_bridge::{SessionBridge, Subscription};
use streamer_config::BridgeConfig;
use streamer_core::{BridgeEvent, EventKind};
use streamer_events::NativeEventChannel;
use streamer_telemetry::{LogFormat, LoggingConfig, Metrics, init_logging};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_stream::StreamExt;
use tracing::{info, warn};

use crate::render;
use crate::simulate::{SimulatedNative, SimulationPlan};

const DEFAULT_TICK_MS: u64 = 200;
const DEFAULT_TICKS: u32 = 5;
const STREAM_MIME_TYPE: &str = "video/*";

/// Parses CLI arguments, executes the requested command, and returns the
/// process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

async fn dispatch(cli: Cli) -> CliResult<()> {
    let config = load_config(cli.config.as_deref())?;
    install_logging(&config);
    match cli.command {
        Command::Play(args) => handle_play(config, args).await,
        Command::Config => render_config(&config),
    }
}

#[derive(Parser)]
#[command(name = "streamer", about = "Stream a torrent through the session bridge")]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "STREAMER_CONFIG",
        help = "JSON configuration file; environment variables are used when absent"
    )]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a session, print its progress, and stop once it is ready.
    Play(PlayArgs),
    /// Print the effective configuration as JSON.
    Config,
}

#[derive(Args, Debug)]
#[allow(clippy::struct_excessive_bools)]
struct PlayArgs {
    magnet: String,
    #[arg(long)]
    save_location: Option<String>,
    #[arg(long, help = "Keep downloaded data after the session stops")]
    keep_files: bool,
    #[arg(long, help = "Do not select the largest file automatically")]
    no_auto_select: bool,
    #[arg(long, value_name = "MESSAGE", help = "Make the session fail with MESSAGE")]
    fail: Option<String>,
    #[arg(long, default_value_t = 0, help = "Keep streaming this long after ready")]
    linger_ms: u64,
    #[arg(
        long,
        default_value_t = DEFAULT_TICK_MS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    tick_ms: u64,
    #[arg(long, default_value_t = DEFAULT_TICKS)]
    ticks: u32,
    #[arg(long, help = "Print every raw native event")]
    trace_events: bool,
    #[arg(long, help = "Hand the stream URL to the platform viewer")]
    open: bool,
    #[arg(long, help = "Print session counters in Prometheus text format")]
    metrics: bool,
}

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

type CliResult<T> = Result<T, CliError>;

impl CliError {
    fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.display_message())
    }
}

impl std::error::Error for CliError {}

fn load_config(path: Option<&Path>) -> CliResult<BridgeConfig> {
    let Some(path) = path else {
        return BridgeConfig::from_env().map_err(|err| {
            CliError::validation(format!("invalid environment configuration: {err}"))
        });
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))
        .map_err(CliError::failure)?;
    let document: Value = serde_json::from_str(&text).map_err(|err| {
        CliError::validation(format!("config file {} is not valid JSON: {err}", path.display()))
    })?;
    BridgeConfig::from_json(&document)
        .map_err(|err| CliError::validation(format!("invalid config file: {err}")))
}

fn install_logging(config: &BridgeConfig) {
    let format = config
        .log_format
        .map_or_else(LogFormat::infer, |output| LogFormat::from_name(output.as_str()));
    let logging = LoggingConfig {
        level: &config.log_level,
        format,
        build_sha: option_env!("STREAMER_BUILD_SHA").unwrap_or("dev"),
    };
    if let Err(err) = init_logging(&logging) {
        eprintln!("warning: logging disabled: {err}");
    }
}

fn render_config(config: &BridgeConfig) -> CliResult<()> {
    let text = serde_json::to_string_pretty(config)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
    println!("{text}");
    Ok(())
}

async fn handle_play(mut config: BridgeConfig, args: PlayArgs) -> CliResult<()> {
    if args.magnet.trim().is_empty() {
        return Err(CliError::validation("magnet link must not be empty"));
    }
    if args.no_auto_select {
        config.auto_select_largest = false;
    }
    let mut options = config.start_options();
    if let Some(location) = args.save_location {
        options = options.with_save_location(location);
    }
    if args.keep_files {
        options = options.with_remove_after_stop(false);
    }

    let channel = NativeEventChannel::new();
    let plan = SimulationPlan::new(
        Duration::from_millis(args.tick_ms),
        args.ticks,
        args.fail,
    );
    let native = Arc::new(SimulatedNative::new(channel.clone(), plan));
    let metrics = Metrics::new().map_err(CliError::failure)?;
    let bridge = SessionBridge::with_metrics(native, channel.clone(), config, metrics.clone());
    let printers = attach_printers(&bridge);
    let tracer = args.trace_events.then(|| spawn_tracer(&channel));

    info!(magnet = %args.magnet, "starting session");
    let result = match bridge.start(&args.magnet, options).await {
        Ok(session) => {
            for line in render::ready_lines(&session) {
                println!("{line}");
            }
            if args.open
                && let Err(err) = bridge.open(&session.url, STREAM_MIME_TYPE)
            {
                warn!(error = %err, "failed to open stream");
            }
            if args.linger_ms > 0 {
                sleep(Duration::from_millis(args.linger_ms)).await;
            }
            Ok(())
        }
        Err(err) => Err(CliError::failure(
            anyhow::Error::new(err).context("session did not become ready"),
        )),
    };

    bridge.stop();
    for subscription in &printers {
        let _ = subscription.remove();
    }
    if let Some(task) = tracer {
        task.abort();
    }
    if args.metrics {
        let text = metrics.render().map_err(CliError::failure)?;
        print!("{text}");
    }
    result
}

fn attach_printers(bridge: &SessionBridge) -> Vec<Subscription> {
    vec![
        bridge.on(EventKind::Status, |event| {
            if let BridgeEvent::Status(status) = event {
                println!("{}", render::status_line(status));
            }
        }),
        bridge.on(EventKind::Progress, |event| {
            if let BridgeEvent::Progress(update) = event
                && !update.files.is_empty()
            {
                println!("{}", render::files_line(update));
            }
        }),
        bridge.on(EventKind::Error, |event| {
            if let BridgeEvent::Error(notice) = event {
                eprintln!("native error: {}", notice.msg);
            }
        }),
        bridge.on(EventKind::Stop, |event| {
            if let BridgeEvent::Stop(notice) = event {
                println!("stopped: {}", notice.msg);
            }
        }),
    ]
}

fn spawn_tracer(channel: &NativeEventChannel) -> JoinHandle<()> {
    let mut stream = channel.subscribe();
    tokio::spawn(async move {
        while let Some(item) = stream.next().await {
            match item {
                Ok(envelope) => println!("{}", render::envelope_line(&envelope)),
                Err(err) => warn!(error = %err, "event trace fell behind"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamer_config::LogOutput;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    fn play_args(extra: &[&str]) -> PlayArgs {
        let mut argv = vec![
            "streamer",
            "play",
            "magnet:?xt=urn:btih:cli",
            "--tick-ms",
            "2",
            "--ticks",
            "2",
        ];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).expect("valid arguments").command {
            Command::Play(args) => args,
            Command::Config => panic!("expected play"),
        }
    }

    fn temp_config(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "streamer-cli-{}-{name}.json",
            std::process::id()
        ));
        fs::write(&path, contents).expect("write config");
        path
    }

    #[test]
    fn play_arguments_parse_with_defaults() {
        let cli = Cli::try_parse_from(["streamer", "play", "magnet:?xt=urn:btih:abc"])
            .expect("valid arguments");
        let Command::Play(args) = cli.command else {
            panic!("expected play");
        };
        assert_eq!(args.magnet, "magnet:?xt=urn:btih:abc");
        assert_eq!(args.tick_ms, DEFAULT_TICK_MS);
        assert_eq!(args.ticks, DEFAULT_TICKS);
        assert_eq!(args.linger_ms, 0);
        assert!(!args.keep_files && !args.no_auto_select && !args.open);
        assert!(args.fail.is_none());
    }

    #[test]
    fn play_rejects_zero_tick_and_missing_magnet() {
        assert!(Cli::try_parse_from(["streamer", "play", "m", "--tick-ms", "0"]).is_err());
        assert!(Cli::try_parse_from(["streamer", "play"]).is_err());
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::try_parse_from(["streamer", "config", "--config", "/tmp/bridge.json"])
            .expect("valid arguments");
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/bridge.json")));
        assert!(matches!(cli.command, Command::Config));
    }

    #[test]
    fn cli_error_maps_exit_codes() {
        let validation = CliError::validation("bad input");
        assert_eq!(validation.exit_code(), 2);
        assert_eq!(validation.display_message(), "bad input");

        let failure = CliError::failure(anyhow!("inner").context("outer"));
        assert_eq!(failure.exit_code(), 3);
        assert_eq!(failure.display_message(), "outer: inner");
    }

    #[test]
    fn load_config_reads_json_file() {
        let path = temp_config(
            "valid",
            r#"{"default_save_location": "/data", "log_format": "json"}"#,
        );
        let config = load_config(Some(&path)).expect("config loads");
        let _ = fs::remove_file(&path);
        assert_eq!(config.default_save_location.as_deref(), Some("/data"));
        assert_eq!(config.log_format, Some(LogOutput::Json));
        assert!(config.remove_after_stop);
    }

    #[test]
    fn load_config_reports_bad_documents() {
        let path = temp_config("unknown", r#"{"surprise": true}"#);
        let err = load_config(Some(&path)).expect_err("unknown field");
        let _ = fs::remove_file(&path);
        assert_eq!(err.exit_code(), 2);

        let path = temp_config("garbage", "not json");
        let err = load_config(Some(&path)).expect_err("not json");
        let _ = fs::remove_file(&path);
        assert!(err.display_message().contains("not valid JSON"));

        let missing = std::env::temp_dir().join("streamer-cli-missing-config.json");
        let err = load_config(Some(&missing)).expect_err("missing file");
        assert_eq!(err.exit_code(), 3);
    }

    #[tokio::test]
    async fn play_completes_against_simulated_module() {
        let args = play_args(&["--keep-files", "--open", "--metrics", "--trace-events"]);
        let outcome = timeout(WAIT, handle_play(BridgeConfig::default(), args))
            .await
            .expect("play finished");
        assert!(outcome.is_ok());
    }

    #[tokio::test]
    async fn play_reports_native_failure() {
        let args = play_args(&["--fail", "no peers"]);
        let err = timeout(WAIT, handle_play(BridgeConfig::default(), args))
            .await
            .expect("play finished")
            .expect_err("scripted failure");
        assert_eq!(err.exit_code(), 3);
        let message = err.display_message();
        assert!(message.starts_with("session did not become ready"));
        assert!(message.contains("no peers"));
    }

    #[tokio::test]
    async fn play_rejects_blank_magnet() {
        let args = PlayArgs {
            magnet: "  ".into(),
            ..play_args(&[])
        };
        let err = handle_play(BridgeConfig::default(), args)
            .await
            .expect_err("blank magnet");
        assert_eq!(err.exit_code(), 2);
    }
}
