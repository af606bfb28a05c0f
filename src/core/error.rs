//! The error categories the core distinguishes.
//!
//! `NotFound`/`Forbidden`/`Conflict` are caller-facing and map directly onto
//! HTTP status codes in the api crate. `StoreUnavailable`/`BusUnavailable`
//! are transient infrastructure errors: surfaced as 5xx at the boundary, but
//! never retried automatically by internal consumers. The Reconciliation
//! Monitor is the retry policy for completions, not this type.

use thiserror::Error;

pub type Result<T = (), E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
	#[error("not found: {0}")]
	NotFound(String),

	#[error("forbidden: {0}")]
	Forbidden(String),

	#[error("conflict: {0}")]
	Conflict(String),

	#[error("invalid request: {0}")]
	Invalid(String),

	#[error("presence/coordination store unavailable: {0}")]
	StoreUnavailable(String),

	#[error("fleet event bus unavailable: {0}")]
	BusUnavailable(String),

	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),

	#[error("config error: {0}")]
	Config(String),

	#[error("{0}")]
	Internal(String),
}

impl Error {
	#[must_use]
	pub fn not_found(msg: impl Into<String>) -> Self { Self::NotFound(msg.into()) }

	#[must_use]
	pub fn forbidden(msg: impl Into<String>) -> Self { Self::Forbidden(msg.into()) }

	#[must_use]
	pub fn conflict(msg: impl Into<String>) -> Self { Self::Conflict(msg.into()) }

	#[must_use]
	pub fn invalid(msg: impl Into<String>) -> Self { Self::Invalid(msg.into()) }
}

impl From<redis::RedisError> for Error {
	fn from(e: redis::RedisError) -> Self { Self::StoreUnavailable(e.to_string()) }
}

impl From<deadpool_redis::PoolError> for Error {
	fn from(e: deadpool_redis::PoolError) -> Self { Self::StoreUnavailable(e.to_string()) }
}
