mod bus;
mod expiry;
mod kv;

use std::time::Duration;

use deadpool_redis::{Config as PoolConfig, Pool, Runtime};
use echotimer_core::Result;

pub use self::{
	bus::{BusMessage, BusTopic},
	expiry::ExpiryNotification,
};

/// Connection to the presence/coordination store: a key/value store with
/// atomic set-with-TTL, set-if-absent-with-TTL, set operations, TTL refresh
/// and a key-expiry notification channel.
#[derive(Clone)]
pub struct RedisStore {
	pool: Pool,
	client: redis::Client,
}

impl RedisStore {
	pub fn connect(url: &str) -> Result<Self> {
		let cfg = PoolConfig::from_url(url);
		let pool = cfg
			.create_pool(Some(Runtime::Tokio1))
			.map_err(|e| echotimer_core::Error::StoreUnavailable(e.to_string()))?;
		let client = redis::Client::open(url)
			.map_err(|e| echotimer_core::Error::StoreUnavailable(e.to_string()))?;
		Ok(Self { pool, client })
	}

	/// A dedicated (non-pooled) connection, for long-lived uses like pub/sub
	/// subscriptions that a short-lived pooled connection isn't meant for.
	pub(crate) async fn dedicated_conn(&self) -> Result<redis::aio::MultiplexedConnection> {
		Ok(self.client.get_multiplexed_async_connection().await?)
	}

	pub(crate) async fn conn(&self) -> Result<deadpool_redis::Connection> {
		self.pool.get().await.map_err(Into::into)
	}

	/// Every store call has a short timeout (5 s suggested).
	pub(crate) async fn with_timeout<T>(
		&self,
		fut: impl std::future::Future<Output = Result<T>>,
	) -> Result<T> {
		match tokio::time::timeout(Duration::from_secs(5), fut).await {
			| Ok(res) => res,
			| Err(_) => Err(echotimer_core::Error::StoreUnavailable("timed out".into())),
		}
	}
}
