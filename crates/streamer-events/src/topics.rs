//! Channel addressing for the shared native event pipe.
//!
//! The native module multiplexes every session over one emitter and tells
//! them apart by appending the session identifier to the kind literal
//! (`"ready" + magnet`). [`ChannelKey`] carries the same address as a typed
//! pair; the string form only exists at the native boundary.

use std::fmt::{self, Display, Formatter};

use crate::error::{EventsError, EventsResult};
use crate::payloads::{EventKind, SessionId};

/// Typed address of a native channel: an event kind, optionally scoped to a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelKey {
    kind: EventKind,
    session: Option<SessionId>,
}

impl ChannelKey {
    /// Unscoped key carrying only the event kind.
    #[must_use]
    pub const fn global(kind: EventKind) -> Self {
        Self {
            kind,
            session: None,
        }
    }

    /// Key scoped to a single session.
    #[must_use]
    pub const fn scoped(kind: EventKind, session: SessionId) -> Self {
        Self {
            kind,
            session: Some(session),
        }
    }

    /// Event kind addressed by this key.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        self.kind
    }

    /// Session the key is scoped to, if any.
    #[must_use]
    pub const fn session(&self) -> Option<&SessionId> {
        self.session.as_ref()
    }

    /// Native event name (`kind` followed by the session identifier).
    #[must_use]
    pub fn event_name(&self) -> String {
        match &self.session {
            Some(session) => format!("{}{}", self.kind.as_str(), session.as_str()),
            None => self.kind.as_str().to_string(),
        }
    }

    /// Parse a native event name back into a key.
    ///
    /// # Errors
    ///
    /// Returns [`EventsError::UnroutableEvent`] when the name does not start
    /// with a known kind literal.
    pub fn parse(name: &str) -> EventsResult<Self> {
        EventKind::ALL
            .into_iter()
            .find_map(|kind| {
                name.strip_prefix(kind.as_str()).map(|rest| {
                    // An empty suffix is the unscoped channel.
                    SessionId::new(rest).map_or_else(
                        |_| Self::global(kind),
                        |session| Self::scoped(kind, session),
                    )
                })
            })
            .ok_or_else(|| EventsError::UnroutableEvent {
                name: name.to_string(),
            })
    }
}

impl Display for ChannelKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.event_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(value: &str) -> SessionId {
        SessionId::new(value).expect("valid session id")
    }

    #[test]
    fn event_name_appends_session_suffix() {
        let key = ChannelKey::scoped(EventKind::Ready, session("magnet:A"));
        assert_eq!(key.event_name(), "readymagnet:A");
        assert_eq!(ChannelKey::global(EventKind::Stop).event_name(), "stop");
    }

    #[test]
    fn parse_recovers_kind_and_session() {
        let key = ChannelKey::parse("statusmagnet:?xt=urn:btih:abc").expect("routable");
        assert_eq!(key.kind(), EventKind::Status);
        assert_eq!(
            key.session().map(SessionId::as_str),
            Some("magnet:?xt=urn:btih:abc")
        );

        // `stop` and `status` share a prefix but not a literal.
        let key = ChannelKey::parse("stopmagnet:B").expect("routable");
        assert_eq!(key.kind(), EventKind::Stop);

        let key = ChannelKey::parse("progress").expect("routable");
        assert_eq!(key, ChannelKey::global(EventKind::Progress));
    }

    #[test]
    fn parse_rejects_unknown_prefixes() {
        assert!(matches!(
            ChannelKey::parse("finishedmagnet:A"),
            Err(EventsError::UnroutableEvent { name }) if name == "finishedmagnet:A"
        ));
    }
}
