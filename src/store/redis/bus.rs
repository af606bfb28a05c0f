//! The Fleet Event Bus transport: a durable, partitioned, at-least-once
//! pub/sub keyed by `timerId`, built on Redis Streams.
//!
//! Ordering per `timerId` falls out of using a single stream per topic; all
//! entries on one stream are totally ordered, which trivially satisfies
//! "per `timerId`, delivery order matches publish order."
//!
//! Broadcast-not-work-stealing ("every server must filter independently")
//! is achieved by giving every server its own consumer group, named after
//! its instance id. Distinct groups on the same stream each see every
//! entry: distinct consumer-group ids per server instance.

use echotimer_core::Result;
use redis::{
	AsyncCommands,
	streams::{StreamReadOptions, StreamReadReply},
};

use super::RedisStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusTopic {
	/// `TARGET_CHANGED`, `TIMER_COMPLETED`, `SHARED_TIMER_ACCESSED`.
	TimerEvents,
	/// `USER_JOINED`, `USER_LEFT`, `TIMESTAMP_SAVED`.
	UserActions,
}

impl BusTopic {
	#[must_use]
	pub const fn stream_key(self) -> &'static str {
		match self {
			| Self::TimerEvents => "stream:timer-events",
			| Self::UserActions => "stream:user-actions",
		}
	}

	#[must_use]
	pub const fn all() -> [Self; 2] { [Self::TimerEvents, Self::UserActions] }
}

/// A single delivered bus entry: its stream id (for acknowledgement) and the
/// JSON envelope payload, keyed by `timerId`.
#[derive(Debug, Clone)]
pub struct BusMessage {
	pub topic: BusTopic,
	pub stream_id: String,
	pub payload: String,
}

impl RedisStore {
	/// `XADD {stream} * payload {json}`.
	pub async fn bus_publish(&self, topic: BusTopic, payload: &str) -> Result<String> {
		self.with_timeout(async {
			let mut conn = self.conn().await?;
			let id: String = conn
				.xadd(topic.stream_key(), "*", &[("payload", payload)])
				.await?;
			Ok(id)
		})
		.await
	}

	/// `XGROUP CREATE {stream} {group} $ MKSTREAM`, tolerant of the group
	/// already existing (`BUSYGROUP`).
	pub async fn bus_ensure_group(&self, topic: BusTopic, group: &str) -> Result {
		let mut conn = self.conn().await?;
		let res: redis::RedisResult<()> = conn
			.xgroup_create_mkstream(topic.stream_key(), group, "$")
			.await;
		match res {
			| Ok(()) => Ok(()),
			| Err(e) if e.to_string().contains("BUSYGROUP") => Ok(()),
			| Err(e) => Err(e.into()),
		}
	}

	/// `XREADGROUP GROUP {group} {consumer} BLOCK {block_ms} COUNT {count}
	/// STREAMS {streams...} >`, one call covering both logical topics so a
	/// single consumer task serves both.
	pub async fn bus_read_group(
		&self,
		group: &str,
		consumer: &str,
		block_ms: usize,
		count: usize,
	) -> Result<Vec<BusMessage>> {
		let mut conn = self.conn().await?;
		let topics = BusTopic::all();
		let keys: Vec<&str> = topics.iter().map(|t| t.stream_key()).collect();
		let ids = vec![">"; keys.len()];

		let opts = StreamReadOptions::default()
			.group(group, consumer)
			.block(block_ms)
			.count(count);

		let reply: StreamReadReply = conn.xread_options(&keys, &ids, &opts).await?;

		let mut out = Vec::new();
		for stream_key in reply.keys {
			let topic = topics
				.iter()
				.copied()
				.find(|t| t.stream_key() == stream_key.key)
				.expect("reply key matches a requested stream");

			for id in stream_key.ids {
				let payload: String = id
					.map
					.get("payload")
					.and_then(|v| match v {
						| redis::Value::BulkString(bytes) =>
							String::from_utf8(bytes.clone()).ok(),
						| _ => None,
					})
					.unwrap_or_default();

				out.push(BusMessage {
					topic,
					stream_id: id.id,
					payload,
				});
			}
		}

		Ok(out)
	}

	pub async fn bus_ack(&self, topic: BusTopic, group: &str, stream_id: &str) -> Result {
		self.with_timeout(async {
			let mut conn = self.conn().await?;
			let _: u64 = conn.xack(topic.stream_key(), group, &[stream_id]).await?;
			Ok(())
		})
		.await
	}
}
