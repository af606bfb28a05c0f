//! Key-expiry notification subscriber.
//!
//! Requires the store to be configured with `notify-keyspace-events Ex` (or
//! broader). The channel `__keyevent@{db}__:expired` is a Redis pub/sub
//! broadcast: every subscribed server process receives every expiry.
//! Completion notification is a broadcast, not a queue; do not replace this
//! with a partitioned consumer.

use echotimer_core::Result;
use futures::{Stream, StreamExt};

use super::RedisStore;

/// A single fired expiry: the raw key name, e.g. `timer:schedule:{timerId}`.
#[derive(Debug, Clone)]
pub struct ExpiryNotification {
	pub key: String,
}

impl RedisStore {
	/// Subscribe to expirations of keys in `db` (the numeric Redis database
	/// index; 0 unless the deployment shards databases). The returned
	/// stream never completes on its own; callers select it against the
	/// server shutdown signal.
	pub async fn subscribe_expired(&self, db: u8) -> Result<impl Stream<Item = ExpiryNotification> + Send + Unpin> {
		let conn = self.dedicated_conn().await?;
		let mut pubsub = conn.into_pubsub();
		let channel = format!("__keyevent@{db}__:expired");
		pubsub.subscribe(&channel).await?;

		let stream = pubsub.into_on_message().filter_map(|msg| async move {
			let key: String = msg.get_payload().ok()?;
			Some(ExpiryNotification { key })
		});

		Ok(Box::pin(stream))
	}
}
