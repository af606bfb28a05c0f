//! Configuration loading: TOML file + environment variables (`ECHOTIMER_`
//! prefix) + CLI overrides, layered with `figment`.

use std::{net::SocketAddr, path::PathBuf};

use figment::{
	Figment,
	providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Presence-index TTLs, in seconds, one per key family. Exposed as config
/// so a deployment can tune decay without a rebuild; defaults match the
/// design exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceTtls {
	pub online_users_secs: u64,
	pub server_users_secs: u64,
	pub connected_server_secs: u64,
	pub session_secs: u64,
	pub user_sessions_secs: u64,
	pub processing_lock_secs: u64,
}

impl Default for PresenceTtls {
	fn default() -> Self {
		Self {
			online_users_secs: 30 * 60,
			server_users_secs: 45 * 60,
			connected_server_secs: 60 * 60,
			session_secs: 120 * 60,
			user_sessions_secs: 120 * 60,
			processing_lock_secs: 5 * 60,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
	/// `server.instance.id`: unique per process. Defaults to a random UUID
	/// if left unset.
	pub instance_id: String,

	/// Address the HTTP/WebSocket listener binds.
	pub listen: SocketAddr,

	/// Presence/coordination store (Redis) connection URL.
	pub presence_store_url: String,

	/// Primary store (PostgreSQL) connection URL.
	pub database_url: String,

	/// Reconciliation Monitor poll period, in seconds. Defaults to once per
	/// minute.
	pub monitor_interval_secs: u64,

	/// Reconciliation window, in seconds. Defaults to a 5-minute window.
	pub monitor_window_secs: i64,

	/// Default timer TTL applied by the HTTP layer's soft-retention policy:
	/// soft-retained with external expiry (e.g., 30 days).
	pub timer_retention_days: i64,

	pub presence_ttls: PresenceTtls,

	/// RUST_LOG-style filter directive for the tracing subscriber.
	pub log: String,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			instance_id: String::new(),
			listen: "0.0.0.0:8080".parse().expect("valid default bind addr"),
			presence_store_url: "redis://127.0.0.1:6379".to_owned(),
			database_url: "postgres://localhost/echotimer".to_owned(),
			monitor_interval_secs: 60,
			monitor_window_secs: 5 * 60,
			timer_retention_days: 30,
			presence_ttls: PresenceTtls::default(),
			log: "info,echotimer=debug".to_owned(),
		}
	}
}

impl Config {
	/// Load layered configuration: built-in defaults, then an optional TOML
	/// file, then `ECHOTIMER_*` environment variables. Later layers win.
	pub fn load(path: Option<&PathBuf>) -> Result<Self> {
		let mut figment = Figment::from(Serialized::defaults(Config::default()));

		if let Some(path) = path {
			figment = figment.merge(Toml::file(path));
		}

		figment = figment.merge(Env::prefixed("ECHOTIMER_").split("__"));

		let mut config: Config = figment
			.extract()
			.map_err(|e| Error::Config(e.to_string()))?;

		if config.instance_id.is_empty() {
			config.instance_id = uuid::Uuid::new_v4().to_string();
		}

		config.check()?;
		Ok(config)
	}

	/// Fail fast on an obviously-broken configuration before the runtime
	/// starts accepting connections.
	fn check(&self) -> Result {
		if self.instance_id.trim().is_empty() {
			return Err(Error::Config("instance_id must not be empty".into()));
		}

		if self.presence_store_url.trim().is_empty() {
			return Err(Error::Config("presence_store_url must not be empty".into()));
		}

		if self.database_url.trim().is_empty() {
			return Err(Error::Config("database_url must not be empty".into()));
		}

		if self.monitor_interval_secs == 0 {
			return Err(Error::Config("monitor_interval_secs must be > 0".into()));
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_pass_check() {
		let config = Config::default();
		assert!(config.check().is_ok());
	}

	#[test]
	fn empty_store_url_rejected() {
		let mut config = Config::default();
		config.presence_store_url.clear();
		assert!(config.check().is_err());
	}

	#[test]
	fn presence_ttls_match_spec_defaults() {
		let ttls = PresenceTtls::default();
		assert_eq!(ttls.online_users_secs, 1800);
		assert_eq!(ttls.server_users_secs, 2700);
		assert_eq!(ttls.connected_server_secs, 3600);
		assert_eq!(ttls.session_secs, 7200);
		assert_eq!(ttls.processing_lock_secs, 300);
	}
}
