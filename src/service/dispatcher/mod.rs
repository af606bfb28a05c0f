//! Local Dispatcher (TimerCore): applies completion/update transactions to
//! the timer record, produces cross-fleet events, and drives the ambient
//! per-session online-count broadcast. Bus-wide fan-out (persisting the
//! event log and pushing to locally-subscribed sessions after the presence
//! filter) is the Fleet Event Bus consumer's job: every server, including
//! the one TimerCore runs on, learns of its own publication by reading it
//! back off the bus, which is what makes the single-writer-many-readers
//! data flow work.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use echotimer_core::{
	Error, Result, Server,
	model::{Role, Timer, TimerView, TimestampMark},
};
use echotimer_store::{PgStore, RedisStore};
use loole::{Receiver, Sender};
use tracing::info;
use uuid::Uuid;

use crate::{
	Args, Service as _, make_name,
	channels::{CompletionSignal, ScheduleRequest},
	events::{Envelope, EventPayload},
	presence,
	sessions::Sessions,
};

pub struct Service {
	server: Arc<Server>,
	server_id: String,
	redis: RedisStore,
	pg: PgStore,
	presence: Arc<presence::Service>,
	sessions: Arc<Sessions>,
	schedule_request: Sender<ScheduleRequest>,
	completion_signal: Receiver<CompletionSignal>,
}

#[async_trait]
impl crate::Service for Service {
	fn build(args: &Args<'_>) -> Result<Arc<Self>> {
		Ok(Arc::new(Self {
			server: Arc::clone(args.server),
			server_id: args.server.config.instance_id.clone(),
			redis: args.redis.clone(),
			pg: args.pg.clone(),
			presence: Arc::clone(args.presence),
			sessions: Arc::clone(args.sessions),
			schedule_request: args.channels.schedule_request.0.clone(),
			completion_signal: args.channels.completion_signal.1.clone(),
		}))
	}

	/// Consumes the TTL Scheduler's `CompletionSignal` channel: the half of
	/// the scheduler/dispatcher cyclic reference resolved with message
	/// passing instead of a direct call. Selects against
	/// `Server::until_shutdown` so the loop actually exits on fleet
	/// shutdown rather than waiting on a channel whose sender (the
	/// scheduler) outlives this loop.
	async fn worker(self: Arc<Self>) -> Result {
		let receiver = self.completion_signal.clone();
		loop {
			tokio::select! {
				signal = receiver.recv_async() => match signal {
					Ok(signal) => {
						let outcome = self.on_completion_signal(&signal.timer_id).await;
						_ = signal.reply.send(outcome.map(|_| ()));
					},
					Err(_) => break,
				},
				() = self.server.until_shutdown() => break,
			}
		}

		Ok(())
	}

	fn name(&self) -> &str { make_name(std::module_path!()) }
}

impl Service {
	#[must_use]
	pub fn presence(&self) -> &Arc<presence::Service> { &self.presence }

	#[must_use]
	pub fn sessions(&self) -> &Arc<Sessions> { &self.sessions }

	/// `create`: allocate `timerId`/`shareToken`, persist, and hand a
	/// schedule request to the TTL Scheduler.
	pub async fn create(&self, target_instant: DateTime<Utc>, owner_id: &str) -> Result<Timer> {
		let now = Utc::now();
		let timer = Timer {
			timer_id: Uuid::new_v4().to_string(),
			owner_id: owner_id.to_owned(),
			target_instant,
			created_at: now,
			updated_at: now,
			completed: false,
			completed_at: None,
			share_token: Uuid::new_v4().simple().to_string(),
		};

		self.pg.insert_timer(&timer).await?;
		self.request_schedule(ScheduleRequest::Schedule(timer.clone())).await;

		Ok(timer)
	}

	/// `getByIdOrToken`: `id` is tried as a `timerId` first, then as a
	/// `shareToken`.
	pub async fn get_by_id_or_token(&self, id_or_token: &str, user_id: &str) -> Result<TimerView> {
		let timer = match self.pg.get_timer(id_or_token).await? {
			| Some(timer) => timer,
			| None => self
				.pg
				.get_timer_by_token(id_or_token)
				.await?
				.ok_or_else(|| Error::not_found(format!("no timer {id_or_token}")))?,
		};

		self.view_of(timer, user_id).await
	}

	async fn view_of(&self, timer: Timer, user_id: &str) -> Result<TimerView> {
		let now = Utc::now();
		let online_count = self.presence.online_count(&timer.timer_id).await?;
		let role = if user_id == timer.owner_id { Role::Owner } else { Role::Viewer };

		Ok(TimerView {
			timer_id: timer.timer_id,
			owner_id: timer.owner_id,
			share_token: timer.share_token,
			target_instant: timer.target_instant,
			created_at: timer.created_at,
			updated_at: timer.updated_at,
			completed: timer.completed,
			completed_at: timer.completed_at,
			server_now: now,
			remaining_millis: echotimer_core::time::remaining(timer.target_instant, now)
				.num_milliseconds(),
			online_count,
			role,
		})
	}

	/// `changeTarget`.
	pub async fn change_target(
		&self,
		timer_id: &str,
		new_target: DateTime<Utc>,
		requester_id: &str,
	) -> Result<TimerView> {
		let timer = self
			.pg
			.get_timer(timer_id)
			.await?
			.ok_or_else(|| Error::not_found(format!("no timer {timer_id}")))?;

		if requester_id != timer.owner_id {
			return Err(Error::forbidden("only the owner may change the target time"));
		}

		if timer.completed {
			return Err(Error::conflict("timer is already completed"));
		}

		if new_target <= Utc::now() {
			return Err(Error::invalid("new target time must be in the future"));
		}

		let now = Utc::now();
		let updated = self
			.pg
			.update_target(timer_id, new_target, now)
			.await?
			.ok_or_else(|| Error::not_found(format!("no timer {timer_id}")))?;

		self.publish(timer_id, EventPayload::TargetTimeChanged { new_target_time: new_target })
			.await?;
		self.request_schedule(ScheduleRequest::Update(updated.clone())).await;

		self.view_of(updated, requester_id).await
	}

	/// `saveTimestamp`: unconditional append.
	pub async fn save_timestamp(
		&self,
		timer_id: &str,
		user_id: &str,
		target_at_save: DateTime<Utc>,
		meta: Option<serde_json::Value>,
	) -> Result<TimestampMark> {
		let saved_at = Utc::now();
		let remaining = echotimer_core::time::remaining(target_at_save, saved_at);

		let mark = TimestampMark {
			id: 0,
			timer_id: timer_id.to_owned(),
			user_id: user_id.to_owned(),
			saved_at,
			remaining_at_save_millis: remaining.num_milliseconds(),
			target_at_save,
			meta,
		};

		let stored = self.pg.insert_timestamp_mark(&mark).await?;

		self.publish(
			timer_id,
			EventPayload::TimestampSaved { user_id: user_id.to_owned(), saved_at },
		)
		.await?;

		Ok(stored)
	}

	/// `onSharedAccess`: emitted when a non-owner subscribes.
	pub async fn on_shared_access(&self, timer_id: &str, joiner_id: &str) -> Result {
		self.publish(timer_id, EventPayload::SharedTimerAccessed { joiner_id: joiner_id.to_owned() })
			.await
	}

	/// `onCompletionSignal`: invoked (indirectly, via the `worker` loop
	/// above) by the TTL Scheduler's winning server.
	async fn on_completion_signal(&self, timer_id: &str) -> Result {
		let Some(timer) = self.pg.get_timer(timer_id).await? else {
			return Err(Error::not_found(format!("no timer {timer_id}")));
		};

		if timer.completed {
			return Ok(());
		}

		let completed_at = Utc::now();
		let timer = self
			.pg
			.complete_timer(timer_id, completed_at)
			.await?
			.ok_or_else(|| Error::not_found(format!("no timer {timer_id}")))?;

		let online_count = self.presence.online_count(timer_id).await?;
		self.publish(
			timer_id,
			EventPayload::TimerCompleted { owner_id: timer.owner_id, online_count },
		)
		.await?;

		info!(timer_id, "timer completed");
		Ok(())
	}

	/// `POST /timers/{id}/complete`: an owner-initiated forced completion,
	/// bypassing the TTL Scheduler's race entirely since there is no expiry
	/// notification to race over.
	pub async fn force_complete(&self, timer_id: &str, requester_id: &str) -> Result<TimerView> {
		let timer = self
			.pg
			.get_timer(timer_id)
			.await?
			.ok_or_else(|| Error::not_found(format!("no timer {timer_id}")))?;

		if requester_id != timer.owner_id {
			return Err(Error::forbidden("only the owner may force-complete a timer"));
		}

		self.on_completion_signal(timer_id).await?;
		self.request_schedule(ScheduleRequest::Cancel { timer_id: timer_id.to_owned() })
			.await;

		let timer = self
			.pg
			.get_timer(timer_id)
			.await?
			.ok_or_else(|| Error::not_found(format!("no timer {timer_id}")))?;
		self.view_of(timer, requester_id).await
	}

	/// Local fan-out entry point used by the session-transport layer when a
	/// session starts. Emission exactly once per session start is resolved
	/// by this being the single call site that emits `USER_JOINED`.
	pub async fn on_session_connected(
		&self,
		timer_id: &str,
		user_id: &str,
		session_id: &str,
	) -> Result {
		self.presence
			.record_connection(timer_id, user_id, &self.server_id, session_id)
			.await?;

		self.publish(timer_id, EventPayload::UserJoined { user_id: user_id.to_owned() })
			.await?;

		if let Some(timer) = self.pg.get_timer(timer_id).await?
			&& timer.owner_id != user_id
		{
			self.on_shared_access(timer_id, user_id).await?;
		}

		self.broadcast_online_count(timer_id).await
	}

	pub async fn on_session_disconnected(
		&self,
		timer_id: &str,
		user_id: &str,
		session_id: &str,
	) -> Result {
		self.presence.remove_connection_by_session(session_id).await?;

		self.publish(timer_id, EventPayload::UserLeft { user_id: user_id.to_owned() })
			.await?;

		self.broadcast_online_count(timer_id).await
	}

	/// Online-count broadcasts: synchronous, local-only, bypasses the fleet
	/// bus because every server can independently query
	/// the (fleet-wide) Presence Index for the current count.
	async fn broadcast_online_count(&self, timer_id: &str) -> Result {
		let online_count = self.presence.online_count(timer_id).await?;
		let envelope = Envelope::new(
			timer_id,
			&self.server_id,
			EventPayload::OnlineUserCountUpdated { online_count },
		);
		self.sessions.push(&envelope).await;
		Ok(())
	}

	async fn publish(&self, timer_id: &str, payload: EventPayload) -> Result {
		let Some(topic) = payload.bus_topic() else {
			return Ok(());
		};

		let envelope = Envelope::new(timer_id, &self.server_id, payload);
		let json = serde_json::to_string(&envelope).map_err(|e| Error::Internal(e.to_string()))?;
		self.redis.bus_publish(topic, &json).await?;
		Ok(())
	}

	async fn request_schedule(&self, request: ScheduleRequest) {
		_ = self.schedule_request.send_async(request).await;
	}
}

