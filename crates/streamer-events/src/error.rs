//! Event channel error primitives.

use std::fmt::{self, Display, Formatter};

/// Errors raised while naming or routing native channel events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventsError {
    /// An event kind literal did not match any known kind.
    UnknownEventKind {
        /// Literal supplied by the caller.
        name: String,
    },
    /// A session identifier was empty.
    EmptySessionId,
    /// A native event name could not be mapped onto a channel key.
    UnroutableEvent {
        /// Native event name as emitted.
        name: String,
    },
}

impl EventsError {
    /// Name carried by the error, when one was supplied.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::UnknownEventKind { name } | Self::UnroutableEvent { name } => Some(name),
            Self::EmptySessionId => None,
        }
    }
}

impl Display for EventsError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownEventKind { .. } => formatter.write_str("unknown event kind"),
            Self::EmptySessionId => formatter.write_str("session identifier must not be empty"),
            Self::UnroutableEvent { .. } => formatter.write_str("native event name is unroutable"),
        }
    }
}

impl std::error::Error for EventsError {}

/// Result wrapper for event channel operations.
pub type EventsResult<T> = Result<T, EventsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_error_exposes_fields() {
        let err = EventsError::UnknownEventKind {
            name: "finished".into(),
        };
        assert_eq!(err.name(), Some("finished"));
        assert_eq!(err.to_string(), "unknown event kind");

        assert_eq!(EventsError::EmptySessionId.name(), None);
        assert_eq!(
            EventsError::UnroutableEvent { name: "x".into() }.to_string(),
            "native event name is unroutable"
        );
    }
}
