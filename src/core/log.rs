//! Logging subsystem: `tracing` + `tracing-subscriber`, env-filter plus an
//! fmt layer. No metrics/exporter stack; that's out of scope.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber. `directive` is a `RUST_LOG`-style
/// filter string (see [`crate::config::Config::log`]); the `RUST_LOG`
/// environment variable, if set, takes precedence.
pub fn init(directive: &str) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

	tracing_subscriber::registry()
		.with(filter)
		.with(fmt::layer().with_target(true))
		.init();
}
