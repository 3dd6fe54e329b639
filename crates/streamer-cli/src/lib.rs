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
#![allow(clippy::redundant_pub_crate)]

//! Command line front end that drives a streaming session through the
//! session bridge.
//!
//! Layout:
//! - `cli.rs`: argument parsing, configuration loading, and command dispatch
//! - `simulate.rs`: in-process native module that scripts a session
//! - `render.rs`: status, size, and event formatting helpers
//! - `main.rs`: thin entrypoint delegating to `run()`

pub(crate) mod cli;
pub(crate) mod render;
pub(crate) mod simulate;

pub use cli::run;
