//! # Design
//!
//! - Keep error messages constant; store operational context in fields.
//! - Native command failures keep the module's `anyhow` error as their source.

use streamer_events::{EventKind, SessionId};
use thiserror::Error;

/// Errors surfaced by the session bridge and the legacy wrapper.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A required argument was empty or otherwise unusable.
    #[error("invalid argument")]
    InvalidArgument {
        /// Argument that was rejected.
        field: &'static str,
    },
    /// The native module reported an `error` event for the session.
    #[error("streaming session failed: {message}")]
    SessionFailed {
        /// Message carried by the native event.
        message: String,
    },
    /// An event name did not match any known kind.
    #[error("unknown event kind")]
    UnknownEventKind {
        /// Name supplied by the caller.
        name: String,
    },
    /// The session was stopped or replaced before it became ready.
    #[error("streaming session cancelled")]
    Cancelled {
        /// Session that was cancelled.
        session: SessionId,
    },
    /// A command issued to the native module failed.
    #[error("native command failed")]
    NativeCommand {
        /// Command that failed.
        operation: &'static str,
        /// Error reported by the native module.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
    /// A native event payload could not be interpreted.
    #[error("malformed native payload")]
    MalformedPayload {
        /// Kind of the offending event.
        kind: EventKind,
        /// Static reason describing the problem.
        reason: &'static str,
    },
}

impl BridgeError {
    pub(crate) fn native(operation: &'static str, source: anyhow::Error) -> Self {
        Self::NativeCommand {
            operation,
            source: source.into(),
        }
    }

    /// Message reported by the native module when the session failed.
    #[must_use]
    pub fn native_message(&self) -> Option<&str> {
        match self {
            Self::SessionFailed { message } => Some(message),
            _ => None,
        }
    }
}

/// Convenience alias for bridge results.
pub type BridgeResult<T> = Result<T, BridgeError>;
