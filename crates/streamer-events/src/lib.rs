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

//! Event plumbing shared by the native module and the session bridge.
//!
//! Layout: `payloads.rs` (event kinds, session ids, envelopes), `topics.rs`
//! (kind + session channel addressing), `routing.rs` (the shared emitter),
//! `error.rs` (error primitives).

pub mod error;
pub mod payloads;
pub mod routing;
pub mod topics;

pub use error::{EventsError, EventsResult};
pub use payloads::{DEFAULT_TAP_CAPACITY, EventId, EventKind, NativeEnvelope, SessionId};
pub use routing::{EventStream, NativeEventChannel, NativeListener};
pub use topics::ChannelKey;
