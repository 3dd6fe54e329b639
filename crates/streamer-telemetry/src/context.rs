//! Span helpers for individual streaming sessions.

use tracing::Span;

/// Span covering one streaming session; `phase` is recorded as it advances.
#[must_use]
pub fn session_span(session: &str) -> Span {
    tracing::info_span!("session", magnet = %session, phase = tracing::field::Empty)
}

/// Record the current lifecycle phase on a session span.
pub fn record_session_phase(span: &Span, phase: &str) {
    span.record("phase", tracing::field::display(phase));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_span_accepts_phase_updates() {
        let span = session_span("magnet:A");
        record_session_phase(&span, "started");
        record_session_phase(&span, "ready");
        let _entered = span.enter();
    }
}
