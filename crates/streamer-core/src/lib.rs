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

//! Engine-agnostic streaming session DTOs and the native module contract.
//!
//! Layout: `model/` (session options, results, status and file DTOs, phases),
//! `service/` (`NativeModule` call contract).

pub mod model;
pub mod service;

pub use model::{
    BridgeEvent, ErrorNotice, FileDescriptor, FileIndex, LARGEST_FILE_SENTINEL, ProgressUpdate,
    SessionPhase, SessionResult, StartOptions, StatusSnapshot, StopNotice,
};
pub use service::NativeModule;
pub use streamer_events::{EventKind, SessionId};
