#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Telemetry primitives shared across the streamer workspace.
//!
//! Centralises logging, session spans, and Prometheus counters so the bridge
//! and the command line front end report sessions the same way.
//! Layout: init.rs (subscriber setup), context.rs (spans), metrics.rs (counters), error.rs.

pub mod context;
pub mod error;
pub mod init;
pub mod metrics;

pub use context::{record_session_phase, session_span};
pub use error::{CollectorStage, Result, TelemetryError};
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging};
pub use metrics::{Metrics, MetricsSnapshot};
