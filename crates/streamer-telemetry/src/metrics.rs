//! Prometheus-backed counters for bridged streaming sessions.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Counts what a front end observes: native events by kind and session outcomes.

use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{CollectorStage, Result, TelemetryError};

/// Prometheus-backed metrics registry for the streaming front end.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    native_events_total: IntCounterVec,
    sessions_started_total: IntCounter,
    sessions_ready_total: IntCounter,
    sessions_failed_total: IntCounter,
    active_sessions: IntGauge,
}

/// Snapshot of the session counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Sessions whose start handshake was issued.
    pub sessions_started_total: u64,
    /// Sessions that produced a stream URL.
    pub sessions_ready_total: u64,
    /// Sessions that failed or were cancelled before becoming ready.
    pub sessions_failed_total: u64,
    /// Sessions currently active.
    pub active_sessions: i64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let native_events_total = IntCounterVec::new(
            Opts::new("native_events_total", "Native events observed by kind"),
            &["kind"],
        )
        .map_err(|source| built("native_events_total", source))?;
        let sessions_started_total = counter("sessions_started_total", "Sessions started")?;
        let sessions_ready_total = counter("sessions_ready_total", "Sessions that became ready")?;
        let sessions_failed_total =
            counter("sessions_failed_total", "Sessions that failed before ready")?;
        let active_sessions = IntGauge::with_opts(Opts::new(
            "active_sessions",
            "Sessions currently streaming",
        ))
        .map_err(|source| built("active_sessions", source))?;

        register(&registry, "native_events_total", &native_events_total)?;
        register(&registry, "sessions_started_total", &sessions_started_total)?;
        register(&registry, "sessions_ready_total", &sessions_ready_total)?;
        register(&registry, "sessions_failed_total", &sessions_failed_total)?;
        register(&registry, "active_sessions", &active_sessions)?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                native_events_total,
                sessions_started_total,
                sessions_ready_total,
                sessions_failed_total,
                active_sessions,
            }),
        })
    }

    /// Count a native event of `kind`.
    pub fn inc_native_event(&self, kind: &str) {
        self.inner
            .native_events_total
            .with_label_values(&[kind])
            .inc();
    }

    /// Record that a session start was issued.
    pub fn session_started(&self) {
        self.inner.sessions_started_total.inc();
        self.inner.active_sessions.inc();
    }

    /// Record that a session produced a stream URL.
    pub fn session_ready(&self) {
        self.inner.sessions_ready_total.inc();
    }

    /// Record that a session failed before becoming ready.
    pub fn session_failed(&self) {
        self.inner.sessions_failed_total.inc();
    }

    /// Record that a session was stopped.
    pub fn session_stopped(&self) {
        if self.inner.active_sessions.get() > 0 {
            self.inner.active_sessions.dec();
        }
    }

    /// Number of native events observed for `kind`.
    #[must_use]
    pub fn native_events(&self, kind: &str) -> u64 {
        self.inner
            .native_events_total
            .with_label_values(&[kind])
            .get()
    }

    /// Render all collectors in the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or produces invalid UTF-8.
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.inner.registry.gather(), &mut buffer)
            .map_err(|err| TelemetryError::Exposition {
                detail: err.to_string(),
            })?;
        String::from_utf8(buffer).map_err(|err| TelemetryError::Exposition {
            detail: err.to_string(),
        })
    }

    /// Capture the session counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sessions_started_total: self.inner.sessions_started_total.get(),
            sessions_ready_total: self.inner.sessions_ready_total.get(),
            sessions_failed_total: self.inner.sessions_failed_total.get(),
            active_sessions: self.inner.active_sessions.get(),
        }
    }
}

fn counter(name: &'static str, help: &str) -> Result<IntCounter> {
    IntCounter::with_opts(Opts::new(name, help))
        .map_err(|source| built(name, source))
}

const fn built(metric: &'static str, source: prometheus::Error) -> TelemetryError {
    TelemetryError::Collector {
        metric,
        stage: CollectorStage::Build,
        source,
    }
}

fn register<C>(registry: &Registry, name: &'static str, collector: &C) -> Result<()>
where
    C: prometheus::core::Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::Collector {
            metric: name,
            stage: CollectorStage::Register,
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_track_session_outcomes() {
        let metrics = Metrics::new().expect("metrics registry");
        metrics.session_started();
        metrics.session_ready();
        metrics.session_started();
        metrics.session_failed();
        metrics.session_stopped();

        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                sessions_started_total: 2,
                sessions_ready_total: 1,
                sessions_failed_total: 1,
                active_sessions: 1,
            }
        );
    }

    #[test]
    fn stopped_never_drives_gauge_negative() {
        let metrics = Metrics::new().expect("metrics registry");
        metrics.session_stopped();
        assert_eq!(metrics.snapshot().active_sessions, 0);
    }

    #[test]
    fn render_includes_native_event_counts() {
        let metrics = Metrics::new().expect("metrics registry");
        metrics.inc_native_event("status");
        metrics.inc_native_event("status");
        assert_eq!(metrics.native_events("status"), 2);

        let rendered = metrics.render().expect("render metrics");
        assert!(rendered.contains("native_events_total{kind=\"status\"} 2"));
        assert!(rendered.contains("sessions_started_total 0"));
    }
}
