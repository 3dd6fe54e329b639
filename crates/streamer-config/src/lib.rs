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

//! Bridge configuration: defaults, environment loading, and JSON document validation.
//!
//! Layout: `model.rs` (`BridgeConfig`), `loader.rs` (environment variables),
//! `validate.rs` (JSON documents), `defaults.rs` (constants and variable names).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::parse_flag;
pub use model::{BridgeConfig, LogOutput};
