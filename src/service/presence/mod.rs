//! Presence Index: the shared key/value mappings {timer -> viewers},
//! {server -> local viewers}, {user -> server}, {session -> attributes},
//! each with its own TTL. This is deliberately global, store-backed state.
//! There is no in-process alternative; it must be the store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use echotimer_core::{Error, Result, config::PresenceTtls, model::PresenceSession};
use echotimer_store::RedisStore;

use crate::{Args, Service, make_name};

/// Bootstrap constructor used once, directly, by `Services::build`. Every
/// other component depends on a shared `Arc<presence::Service>`, which makes
/// the usual `Service::build(&Args)` path circular for this one component
/// (it would need itself to construct `Args`).
#[must_use]
pub fn new(redis: RedisStore, ttls: PresenceTtls) -> Arc<Service> { Arc::new(Service { redis, ttls }) }

fn online_users_key(timer_id: &str) -> String { format!("timer:{timer_id}:online_users") }
fn server_users_key(server_id: &str) -> String { format!("server:{server_id}:users") }
fn connected_server_key(user_id: &str) -> String { format!("user:{user_id}:connected_server_id") }
fn session_key(session_id: &str) -> String { format!("session:{session_id}") }
fn user_sessions_key(user_id: &str) -> String { format!("user:{user_id}:sessions") }

pub struct Service {
	redis: RedisStore,
	ttls: PresenceTtls,
}

#[async_trait]
impl crate::Service for Service {
	fn build(args: &Args<'_>) -> Result<Arc<Self>> {
		Ok(new(args.redis.clone(), args.server.config.presence_ttls.clone()))
	}

	fn name(&self) -> &str { make_name(std::module_path!()) }
}

impl Service {
	/// `recordConnection`: adds to all four canonical mappings plus the
	/// user-sessions index, each with its TTL.
	pub async fn record_connection(
		&self,
		timer_id: &str,
		user_id: &str,
		server_id: &str,
		session_id: &str,
	) -> Result {
		self.redis
			.sadd(&online_users_key(timer_id), user_id, self.ttls.online_users_secs)
			.await?;
		self.redis
			.sadd(&server_users_key(server_id), user_id, self.ttls.server_users_secs)
			.await?;
		self.redis
			.set_ex(&connected_server_key(user_id), server_id, self.ttls.connected_server_secs)
			.await?;
		self.redis
			.sadd(&user_sessions_key(user_id), session_id, self.ttls.user_sessions_secs)
			.await?;

		let session = PresenceSession {
			session_id: session_id.to_owned(),
			timer_id: timer_id.to_owned(),
			user_id: user_id.to_owned(),
			server_id: server_id.to_owned(),
			connected_at: Utc::now(),
			last_heartbeat: Utc::now(),
		};
		let payload = serde_json::to_string(&session).map_err(|e| Error::Internal(e.to_string()))?;
		self.redis
			.set_ex(&session_key(session_id), &payload, self.ttls.session_secs)
			.await?;

		Ok(())
	}

	/// `removeConnection(sessionId)`: reads the session record, performs the
	/// reverse removals, deletes the session. A no-op if the session has
	/// already expired naturally.
	pub async fn remove_connection_by_session(&self, session_id: &str) -> Result {
		let Some(raw) = self.redis.get(&session_key(session_id)).await? else {
			return Ok(());
		};

		let session: PresenceSession =
			serde_json::from_str(&raw).map_err(|e| Error::Internal(e.to_string()))?;

		self.reverse_remove(&session.timer_id, &session.user_id, &session.server_id, session_id)
			.await
	}

	/// `removeConnection(timerId, userId)`: forced removal (used by
	/// moderators/debug tools), identified positionally rather than by
	/// session. The server id and session id are looked up best-effort so
	/// the removal is as complete as possible even without them known.
	pub async fn remove_connection_forced(&self, timer_id: &str, user_id: &str) -> Result {
		let server_id = self.redis.get(&connected_server_key(user_id)).await?;
		self.redis.srem(&online_users_key(timer_id), user_id).await?;
		if let Some(server_id) = &server_id {
			self.redis.srem(&server_users_key(server_id), user_id).await?;
		}
		self.redis.del(&connected_server_key(user_id)).await?;

		Ok(())
	}

	async fn reverse_remove(
		&self,
		timer_id: &str,
		user_id: &str,
		server_id: &str,
		session_id: &str,
	) -> Result {
		self.redis.srem(&online_users_key(timer_id), user_id).await?;
		self.redis.srem(&server_users_key(server_id), user_id).await?;
		self.redis.srem(&user_sessions_key(user_id), session_id).await?;
		self.redis.del(&connected_server_key(user_id)).await?;
		self.redis.del(&session_key(session_id)).await?;

		Ok(())
	}

	/// `heartbeat`: refresh all TTLs tied to the session and update
	/// `lastHeartbeat`. A no-op if the session already expired.
	pub async fn heartbeat(&self, session_id: &str) -> Result {
		let Some(raw) = self.redis.get(&session_key(session_id)).await? else {
			return Ok(());
		};

		let mut session: PresenceSession =
			serde_json::from_str(&raw).map_err(|e| Error::Internal(e.to_string()))?;
		session.last_heartbeat = Utc::now();

		self.redis
			.expire(&online_users_key(&session.timer_id), self.ttls.online_users_secs as i64)
			.await?;
		self.redis
			.expire(&server_users_key(&session.server_id), self.ttls.server_users_secs as i64)
			.await?;
		self.redis
			.expire(&connected_server_key(&session.user_id), self.ttls.connected_server_secs as i64)
			.await?;
		self.redis
			.expire(&user_sessions_key(&session.user_id), self.ttls.user_sessions_secs as i64)
			.await?;

		let payload = serde_json::to_string(&session).map_err(|e| Error::Internal(e.to_string()))?;
		self.redis
			.set_ex(&session_key(session_id), &payload, self.ttls.session_secs)
			.await?;

		Ok(())
	}

	/// `isServerRelevant`: `timer:{t}:online_users ∩ server:{s}:users ≠ ∅`,
	/// via the constant-memory `hasAny` primitive. Must not materialize the
	/// intersection set.
	pub async fn is_server_relevant(&self, timer_id: &str, server_id: &str) -> Result<bool> {
		self.redis
			.sets_intersect(&online_users_key(timer_id), &server_users_key(server_id))
			.await
	}

	/// `onlineCount`: cardinality of the timer's viewer set.
	pub async fn online_count(&self, timer_id: &str) -> Result<u64> {
		self.redis.scard(&online_users_key(timer_id)).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn key_families_match_naming_table() {
		assert_eq!(online_users_key("t1"), "timer:t1:online_users");
		assert_eq!(server_users_key("s1"), "server:s1:users");
		assert_eq!(connected_server_key("u1"), "user:u1:connected_server_id");
		assert_eq!(session_key("sess1"), "session:sess1");
		assert_eq!(user_sessions_key("u1"), "user:u1:sessions");
	}

	/// Exercises the full `recordConnection` -> `isServerRelevant` ->
	/// `removeConnection` round trip against a real store: recordConnection
	/// followed by removeConnection for the same session must leave no key
	/// for that session. Requires `REDIS_URL`.
	#[tokio::test]
	#[ignore = "requires a running Redis at REDIS_URL"]
	async fn record_and_remove_connection_round_trips() {
		let url = std::env::var("REDIS_URL").expect("REDIS_URL must be set for this test");
		let redis = RedisStore::connect(&url).expect("connect");
		let presence = new(redis.clone(), PresenceTtls::default());

		let timer_id = format!("test-timer-{}", uuid::Uuid::new_v4());
		let user_id = "test-user";
		let server_id = "test-server";
		let session_id = format!("test-session-{}", uuid::Uuid::new_v4());

		presence
			.record_connection(&timer_id, user_id, server_id, &session_id)
			.await
			.expect("record_connection");

		assert_eq!(presence.online_count(&timer_id).await.expect("online_count"), 1);
		assert!(presence
			.is_server_relevant(&timer_id, server_id)
			.await
			.expect("is_server_relevant"));

		presence
			.remove_connection_by_session(&session_id)
			.await
			.expect("remove_connection_by_session");

		assert_eq!(presence.online_count(&timer_id).await.expect("online_count"), 0);
		assert!(redis.get(&session_key(&session_id)).await.expect("get").is_none());
	}
}
