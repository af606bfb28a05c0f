//! Shared foundations used by every echotimer crate: the error type, config
//! loading, logging setup, time helpers and the `Server` handle threaded
//! through the `Service` trait implementations.

pub mod config;
pub mod error;
pub mod log;
pub mod model;
pub mod server;
pub mod time;

pub use config::Config;
pub use error::{Error, Result};
pub use server::Server;

/// Crate version, surfaced in `/monitoring/completion-stats` and the CLI
/// `--version` banner.
#[must_use]
pub fn version() -> &'static str { env!("CARGO_PKG_VERSION") }
