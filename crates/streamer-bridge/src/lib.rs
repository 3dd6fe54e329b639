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

//! Client-side binding for the native torrent-streaming module.
//!
//! [`SessionBridge`] turns the shared native event channel into typed
//! per-kind handlers plus a single-settlement `start` future. The
//! [`legacy::Torrent`] wrapper keeps the older per-instance surface.
//!
//! Layout: `bridge.rs` (session bridge), `listeners.rs` (handler registry),
//! `convert.rs` (payload normalisation), `legacy.rs`, `error.rs`.

mod bridge;
pub mod convert;
pub mod error;
pub mod legacy;
mod listeners;

pub use bridge::SessionBridge;
pub use error::{BridgeError, BridgeResult};
pub use legacy::{LegacyEvent, Torrent, TorrentSnapshot};
pub use listeners::{EventHandler, Subscription};
