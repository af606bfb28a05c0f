//! TTL Scheduler: registers per-timer expiry keys, receives expiry
//! notifications from the store, elects one server per expiry via a
//! short-lived mutex, and emits a local completion signal. Runs the state
//! machine `SCHEDULED -> EXPIRED -> COMPLETING -> COMPLETED`, with
//! `CANCELED` and the lock-lost skip branch.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use echotimer_core::{
	Result, Server,
	model::{CompletionLog, Timer},
};
use echotimer_store::{PgStore, RedisStore};
use futures::StreamExt;
use loole::{Receiver, Sender};
use tracing::{debug, info, warn};

use crate::{
	Args, Service as _, make_name,
	channels::{CompletionSignal, ScheduleRequest},
};

/// Per-timer completion mutex TTL. Bounds the blast radius if a holder
/// crashes mid-completion.
const PROCESSING_LOCK_TTL_SECS: u64 = 5 * 60;

pub struct Service {
	server: Arc<Server>,
	server_id: String,
	redis: RedisStore,
	pg: PgStore,
	completion_signal: Sender<CompletionSignal>,
	schedule_request: Receiver<ScheduleRequest>,
}

#[async_trait]
impl crate::Service for Service {
	fn build(args: &Args<'_>) -> Result<Arc<Self>> {
		Ok(Arc::new(Self {
			server: Arc::clone(args.server),
			server_id: args.server.config.instance_id.clone(),
			redis: args.redis.clone(),
			pg: args.pg.clone(),
			completion_signal: args.channels.completion_signal.0.clone(),
			schedule_request: args.channels.schedule_request.1.clone(),
		}))
	}

	async fn worker(self: Arc<Self>) -> Result {
		let expiry = self.redis.subscribe_expired(0).await?;
		futures::pin_mut!(expiry);

		let schedule_request = self.schedule_request.clone();
		loop {
			tokio::select! {
				Some(notification) = expiry.next() => {
					let Some(timer_id) = notification.key.strip_prefix("timer:schedule:") else {
						continue;
					};
					if let Err(e) = self.handle_expiry(timer_id).await {
						warn!(timer_id, error = %e, "completion protocol failed");
					}
				},
				event = schedule_request.recv_async() => match event {
					Ok(ScheduleRequest::Schedule(timer)) => {
						if let Err(e) = self.schedule(&timer).await {
							warn!(timer_id = %timer.timer_id, error = %e, "schedule failed");
						}
					},
					Ok(ScheduleRequest::Update(timer)) => {
						if let Err(e) = self.update(&timer).await {
							warn!(timer_id = %timer.timer_id, error = %e, "schedule update failed");
						}
					},
					Ok(ScheduleRequest::Cancel { timer_id }) => {
						if let Err(e) = self.cancel(&timer_id).await {
							warn!(timer_id, error = %e, "schedule cancel failed");
						}
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

fn schedule_key(timer_id: &str) -> String { format!("timer:schedule:{timer_id}") }
fn processing_key(timer_id: &str) -> String { format!("timer:processing:{timer_id}") }

impl Service {
	/// `schedule`: no-op if already completed or the target has already
	/// passed.
	pub async fn schedule(&self, timer: &Timer) -> Result {
		if timer.completed {
			return Ok(());
		}

		let ttl = (timer.target_instant - Utc::now()).num_seconds();
		if ttl <= 0 {
			return Ok(());
		}

		self.redis
			.set_ex(&schedule_key(&timer.timer_id), &timer.timer_id, ttl as u64)
			.await
	}

	/// `update`: delete then set, treated as an idempotent replace. A
	/// notification fired between the two calls is an accepted race; the
	/// Monitor is the safety net.
	pub async fn update(&self, timer: &Timer) -> Result {
		self.redis.del(&schedule_key(&timer.timer_id)).await?;
		self.schedule(timer).await
	}

	pub async fn cancel(&self, timer_id: &str) -> Result {
		self.redis.del(&schedule_key(timer_id)).await
	}

	/// Completion protocol: log, acquire the mutex, signal, release.
	async fn handle_expiry(&self, timer_id: &str) -> Result {
		let received_at = Utc::now();

		// Step 2: load the timer.
		let Some(timer) = self.pg.get_timer(timer_id).await? else {
			let log = CompletionLog {
				id: 0,
				timer_id: timer_id.to_owned(),
				server_id: self.server_id.clone(),
				notification_received_at: received_at,
				processing_started_at: None,
				processing_completed_at: None,
				lock_acquired: false,
				success: false,
				error_message: Some("timer not found".to_owned()),
				original_target_instant: received_at,
				processing_delay_millis: None,
			};
			self.pg.insert_completion_log(&log).await?;
			return Ok(());
		};

		// Step 3: write the initial log.
		let log = CompletionLog {
			id: 0,
			timer_id: timer_id.to_owned(),
			server_id: self.server_id.clone(),
			notification_received_at: received_at,
			processing_started_at: None,
			processing_completed_at: None,
			lock_acquired: false,
			success: false,
			error_message: None,
			original_target_instant: timer.target_instant,
			processing_delay_millis: None,
		};
		let log_id = self.pg.insert_completion_log(&log).await?;

		// Step 4: non-blocking mutex acquisition.
		let lock_acquired = self
			.redis
			.set_nx_ex(&processing_key(timer_id), &self.server_id, PROCESSING_LOCK_TTL_SECS)
			.await?;

		// Step 5.
		let processing_started_at = Utc::now();
		let processing_delay_millis =
			(processing_started_at - timer.target_instant).num_milliseconds();

		if !lock_acquired {
			// Step 7.
			self.pg
				.update_completion_log(
					log_id,
					false,
					Some(processing_started_at),
					Some(Utc::now()),
					false,
					Some("lock not acquired"),
					Some(processing_delay_millis),
				)
				.await?;
			debug!(timer_id, "completion mutex lost; skipping");
			return Ok(());
		}

		// Step 6: emit the in-process completion signal and wait for
		// TimerCore's reply. The mutex is released on every exit path below.
		let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
		let send_result = self
			.completion_signal
			.send_async(CompletionSignal { timer_id: timer_id.to_owned(), reply: reply_tx })
			.await;

		let (success, error_message) = match send_result {
			| Ok(()) => match reply_rx.await {
				| Ok(Ok(())) => (true, None),
				| Ok(Err(e)) => (false, Some(e.to_string())),
				| Err(e) => (false, Some(e.to_string())),
			},
			| Err(e) => (false, Some(e.to_string())),
		};

		self.redis.del(&processing_key(timer_id)).await?;

		self.pg
			.update_completion_log(
				log_id,
				true,
				Some(processing_started_at),
				Some(Utc::now()),
				success,
				error_message.as_deref(),
				Some(processing_delay_millis),
			)
			.await?;

		if success {
			info!(timer_id, delay_ms = processing_delay_millis, "completion committed");
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn key_naming_matches_table() {
		assert_eq!(schedule_key("t1"), "timer:schedule:t1");
		assert_eq!(processing_key("t1"), "timer:processing:t1");
	}

	/// Round-trip law: changeTarget(t, X) followed by changeTarget(t, Y)
	/// where Y > X > now leaves `timer:schedule:{t}` with TTL equal to Y
	/// minus now. Requires `REDIS_URL`.
	#[tokio::test]
	#[ignore = "requires a running Redis at REDIS_URL"]
	async fn update_replaces_schedule_ttl() {
		let url = std::env::var("REDIS_URL").expect("REDIS_URL must be set for this test");
		let redis = RedisStore::connect(&url).expect("connect");

		let timer_id = format!("test-timer-{}", uuid::Uuid::new_v4());
		let timer = Timer {
			timer_id: timer_id.clone(),
			owner_id: "owner".into(),
			target_instant: Utc::now() + chrono::Duration::seconds(60),
			created_at: Utc::now(),
			updated_at: Utc::now(),
			completed: false,
			completed_at: None,
			share_token: "tok".into(),
		};

		redis
			.set_ex(&schedule_key(&timer_id), &timer_id, 60)
			.await
			.expect("initial schedule");

		let mut updated = timer;
		updated.target_instant = Utc::now() + chrono::Duration::seconds(600);
		redis.del(&schedule_key(&timer_id)).await.expect("del");
		let new_ttl = (updated.target_instant - Utc::now()).num_seconds();
		redis
			.set_ex(&schedule_key(&timer_id), &timer_id, new_ttl as u64)
			.await
			.expect("replacement schedule");

		let ttl = redis.ttl(&schedule_key(&timer_id)).await.expect("ttl").expect("key has a ttl");
		assert!((590..=600).contains(&ttl), "ttl was {ttl}");
	}
}
