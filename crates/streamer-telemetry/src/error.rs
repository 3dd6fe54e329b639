//! Failures raised while wiring logging or session metrics.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

use tracing_subscriber::util::TryInitError;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Step at which a Prometheus collector could not be set up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorStage {
    /// Building the collector from its options.
    Build,
    /// Adding the collector to the session registry.
    Register,
}

impl CollectorStage {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Register => "register",
        }
    }
}

/// Errors raised by telemetry helpers.
#[derive(Debug)]
pub enum TelemetryError {
    /// A global subscriber was already installed, or installation failed.
    LoggingUnavailable {
        /// Error reported by `tracing-subscriber`.
        source: TryInitError,
    },
    /// A session collector could not be set up.
    Collector {
        /// Metric name.
        metric: &'static str,
        /// Step that failed.
        stage: CollectorStage,
        /// Error reported by `prometheus`.
        source: prometheus::Error,
    },
    /// The text exposition could not be produced.
    Exposition {
        /// What went wrong while encoding.
        detail: String,
    },
}

impl Display for TelemetryError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoggingUnavailable { .. } => formatter.write_str("logging subscriber unavailable"),
            Self::Collector { metric, stage, .. } => {
                write!(formatter, "could not {} collector `{metric}`", stage.as_str())
            }
            Self::Exposition { detail } => write!(formatter, "metrics exposition failed: {detail}"),
        }
    }
}

impl Error for TelemetryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::LoggingUnavailable { source } => Some(source),
            Self::Collector { source, .. } => Some(source),
            Self::Exposition { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collector_errors_name_metric_and_stage() {
        let err = TelemetryError::Collector {
            metric: "native_events_total",
            stage: CollectorStage::Register,
            source: prometheus::Error::AlreadyReg,
        };
        assert_eq!(err.to_string(), "could not register collector `native_events_total`");
        assert!(err.source().is_some());
    }

    #[test]
    fn exposition_errors_carry_detail() {
        let err = TelemetryError::Exposition {
            detail: "invalid utf-8".into(),
        };
        assert_eq!(err.to_string(), "metrics exposition failed: invalid utf-8");
        assert!(err.source().is_none());
    }
}
