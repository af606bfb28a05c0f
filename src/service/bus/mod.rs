//! Fleet Event Bus: the durable, partitioned, at-least-once consumer loop
//! every server runs over both logical topics (`timer-events`,
//! `user-actions`). This is also where TimerCore's "local fan-out" is
//! physically performed: TimerCore only ever publishes; every server,
//! including the publisher's own, picks the event back up here, applies
//! the presence filter, and pushes it to locally-subscribed sessions.

use std::sync::Arc;

use async_trait::async_trait;
use echotimer_core::{Error, Result, Server};
use echotimer_store::{
	RedisStore,
	redis::{BusMessage, BusTopic},
};
use tracing::warn;

use crate::{Args, Service as _, events::Envelope, make_name, presence, sessions::Sessions};

/// Read batch size / long-poll block for `XREADGROUP`.
const READ_COUNT: usize = 64;
const BLOCK_MS: usize = 2_000;

pub struct Service {
	server: Arc<Server>,
	server_id: String,
	redis: RedisStore,
	presence: Arc<presence::Service>,
	sessions: Arc<Sessions>,
}

#[async_trait]
impl crate::Service for Service {
	fn build(args: &Args<'_>) -> Result<Arc<Self>> {
		Ok(Arc::new(Self {
			server: Arc::clone(args.server),
			server_id: args.server.config.instance_id.clone(),
			redis: args.redis.clone(),
			presence: Arc::clone(args.presence),
			sessions: Arc::clone(args.sessions),
		}))
	}

	/// The `XREADGROUP` long-poll is bounded by its own `BLOCK_MS`, so
	/// racing it against `Server::until_shutdown` bounds how long this loop
	/// takes to notice a fleet-wide shutdown to at most one block interval.
	async fn worker(self: Arc<Self>) -> Result {
		for topic in BusTopic::all() {
			self.redis.bus_ensure_group(topic, &self.server_id).await?;
		}

		loop {
			let read = self.redis.bus_read_group(&self.server_id, &self.server_id, BLOCK_MS, READ_COUNT);

			let messages = tokio::select! {
				result = read => match result {
					| Ok(messages) => messages,
					| Err(e) => {
						warn!(error = %e, "bus read failed, retrying");
						continue;
					},
				},
				() = self.server.until_shutdown() => return Ok(()),
			};

			for message in messages {
				self.handle(&message).await;
			}
		}
	}

	fn name(&self) -> &str { make_name(std::module_path!()) }
}

impl Service {
	/// Per-event handler. Any error in the filter/log/push steps is logged
	/// and the event acknowledged regardless: continue-on-error, because
	/// retry could only produce duplicates.
	async fn handle(&self, message: &BusMessage) {
		if let Err(e) = self.try_handle(message).await {
			warn!(stream_id = %message.stream_id, error = %e, "bus event handling failed");
		}

		if let Err(e) = self.redis.bus_ack(message.topic, &self.server_id, &message.stream_id).await {
			warn!(stream_id = %message.stream_id, error = %e, "bus ack failed");
		}
	}

	async fn try_handle(&self, message: &BusMessage) -> Result {
		let envelope: Envelope =
			serde_json::from_str(&message.payload).map_err(|e| Error::Internal(e.to_string()))?;

		// Step 1/2: always-dispatch classes skip the presence filter.
		if !envelope.payload.always_dispatch()
			&& !self.presence.is_server_relevant(&envelope.timer_id, &self.server_id).await?
		{
			return Ok(());
		}

		// Append-only event log, TTL ~1 year.
		self.redis
			.set_ex(&event_log_key(&envelope), &message.payload, 365 * 24 * 60 * 60)
			.await?;

		// Push to every locally-subscribed session.
		self.sessions.push(&envelope).await;

		// A join/leave on this timer may have changed the count every
		// other locally-relevant server sees; recompute and broadcast it
		// alongside the event. TimerCore's own broadcast only covers the
		// originating server, but every relevant server recomputing it
		// here from the same fleet-wide Presence Index keeps viewers on
		// other servers in sync too.
		if matches!(
			envelope.payload,
			crate::events::EventPayload::UserJoined { .. } | crate::events::EventPayload::UserLeft { .. }
		) {
			let online_count = self.presence.online_count(&envelope.timer_id).await?;
			let update = Envelope::new(
				&envelope.timer_id,
				&self.server_id,
				crate::events::EventPayload::OnlineUserCountUpdated { online_count },
			);
			self.sessions.push(&update).await;
		}

		Ok(())
	}
}

fn event_log_key(envelope: &Envelope) -> String {
	format!("eventlog:{}:{}", envelope.timer_id, envelope.event_id)
}
