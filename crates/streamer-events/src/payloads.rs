//! Event kinds, session identifiers, and the envelope published to observers.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::{EventsError, EventsResult};
use crate::topics::ChannelKey;

/// Identifier assigned to each emission observed on the channel.
pub type EventId = u64;

/// Default buffer size for the observer broadcast channel.
pub const DEFAULT_TAP_CAPACITY: usize = 256;

/// Kinds of events the native module emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Periodic download status (progress, rate, seeds, buffer).
    Status,
    /// Session failure reported by the native engine.
    Error,
    /// Session stopped notification.
    Stop,
    /// Intermediate lifecycle progress, including the discovered file list.
    Progress,
    /// Stream is ready to be served; internal to the start handshake.
    Ready,
}

impl EventKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Status,
        Self::Error,
        Self::Stop,
        Self::Progress,
        Self::Ready,
    ];

    /// Kinds application code may subscribe to.
    pub const PUBLIC: [Self; 4] = [Self::Status, Self::Error, Self::Stop, Self::Progress];

    /// Literal used on the native channel.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Error => "error",
            Self::Stop => "stop",
            Self::Progress => "progress",
            Self::Ready => "ready",
        }
    }

    /// Whether listeners outside the bridge may observe this kind.
    #[must_use]
    pub const fn is_public(self) -> bool {
        !matches!(self, Self::Ready)
    }
}

impl Display for EventKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = EventsError;

    fn from_str(value: &str) -> EventsResult<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| EventsError::UnknownEventKind {
                name: value.to_string(),
            })
    }
}

/// Opaque, non-empty identifier for a streaming session (a magnet URI).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Wrap a session identifier, rejecting empty strings.
    ///
    /// # Errors
    ///
    /// Returns [`EventsError::EmptySessionId`] when `value` is empty.
    pub fn new(value: impl Into<String>) -> EventsResult<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(EventsError::EmptySessionId);
        }
        Ok(Self(value))
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SessionId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl TryFrom<String> for SessionId {
    type Error = EventsError;

    fn try_from(value: String) -> EventsResult<Self> {
        Self::new(value)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

/// Metadata wrapper around a native emission, delivered to channel observers.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeEnvelope {
    /// Sequential identifier assigned at emission time.
    pub id: EventId,
    /// Emission timestamp.
    pub timestamp: DateTime<Utc>,
    /// Channel key the payload was emitted on.
    pub key: ChannelKey,
    /// Raw payload as produced by the native module.
    pub payload: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_round_trips_through_literal() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>(), Ok(kind));
        }
        assert!(matches!(
            "finished".parse::<EventKind>(),
            Err(EventsError::UnknownEventKind { name }) if name == "finished"
        ));
    }

    #[test]
    fn ready_is_the_only_internal_kind() {
        assert!(!EventKind::Ready.is_public());
        assert!(EventKind::PUBLIC.iter().all(|kind| kind.is_public()));
    }

    #[test]
    fn session_id_rejects_empty_values() {
        assert_eq!(SessionId::new(""), Err(EventsError::EmptySessionId));
        let id = SessionId::new("magnet:?xt=urn:btih:abc").expect("valid id");
        assert_eq!(id.as_str(), "magnet:?xt=urn:btih:abc");
        assert_eq!(id.to_string(), "magnet:?xt=urn:btih:abc");
    }

    #[test]
    fn session_id_deserialization_enforces_non_empty() {
        let parsed: Result<SessionId, _> = serde_json::from_str("\"\"");
        assert!(parsed.is_err());
        let parsed: SessionId = serde_json::from_str("\"magnet:A\"").expect("valid id");
        assert_eq!(parsed.as_str(), "magnet:A");
    }
}
