//! Low-level key/value primitives. Key naming and TTL policy live in
//! `echotimer_service` (the Presence Index and TTL Scheduler own those
//! semantics); this module only exposes the store operations: atomic
//! set-with-TTL, set-if-absent-with-TTL, set operations
//! (add/remove/intersection-has-any), TTL refresh.
//!
//! Every method runs through [`RedisStore::with_timeout`]. Every store call
//! has a short timeout (5 s suggested).

use echotimer_core::Result;
use redis::AsyncCommands;

use super::RedisStore;

impl RedisStore {
	/// `SET key value EX ttl_secs`.
	pub async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result {
		self.with_timeout(async {
			let mut conn = self.conn().await?;
			let () = conn.set_ex(key, value, ttl_secs).await?;
			Ok(())
		})
		.await
	}

	/// `SET key value NX EX ttl_secs`. Returns `true` if the key was
	/// previously absent and is now set by this call: the set-if-absent
	/// primitive the completion mutex is built on.
	pub async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool> {
		self.with_timeout(async {
			let mut conn = self.conn().await?;
			let opts = redis::SetOptions::default()
				.conditional_set(redis::ExistenceCheck::NX)
				.with_expiration(redis::SetExpiry::EX(ttl_secs as usize));
			let reply: Option<String> = conn.set_options(key, value, opts).await?;
			Ok(reply.is_some())
		})
		.await
	}

	pub async fn get(&self, key: &str) -> Result<Option<String>> {
		self.with_timeout(async {
			let mut conn = self.conn().await?;
			Ok(conn.get(key).await?)
		})
		.await
	}

	pub async fn del(&self, key: &str) -> Result {
		self.with_timeout(async {
			let mut conn = self.conn().await?;
			let _: u64 = conn.del(key).await?;
			Ok(())
		})
		.await
	}

	pub async fn expire(&self, key: &str, ttl_secs: i64) -> Result {
		self.with_timeout(async {
			let mut conn = self.conn().await?;
			let _: bool = conn.expire(key, ttl_secs).await?;
			Ok(())
		})
		.await
	}

	/// Seconds until `key` expires, or `None` if it has no TTL or is absent.
	pub async fn ttl(&self, key: &str) -> Result<Option<i64>> {
		self.with_timeout(async {
			let mut conn = self.conn().await?;
			let ttl: i64 = conn.ttl(key).await?;
			Ok(if ttl < 0 { None } else { Some(ttl) })
		})
		.await
	}

	pub async fn sadd(&self, key: &str, member: &str, ttl_secs: u64) -> Result {
		self.with_timeout(async {
			let mut conn = self.conn().await?;
			let _: u64 = conn.sadd(key, member).await?;
			let _: bool = conn.expire(key, ttl_secs as i64).await?;
			Ok(())
		})
		.await
	}

	pub async fn srem(&self, key: &str, member: &str) -> Result {
		self.with_timeout(async {
			let mut conn = self.conn().await?;
			let _: u64 = conn.srem(key, member).await?;
			Ok(())
		})
		.await
	}

	pub async fn scard(&self, key: &str) -> Result<u64> {
		self.with_timeout(async {
			let mut conn = self.conn().await?;
			Ok(conn.scard(key).await?)
		})
		.await
	}

	pub async fn smembers(&self, key: &str) -> Result<Vec<String>> {
		self.with_timeout(async {
			let mut conn = self.conn().await?;
			Ok(conn.smembers(key).await?)
		})
		.await
	}

	/// `hasAny` between two sets: `SINTERCARD 2 a b LIMIT 1`. `isServerRelevant`
	/// must not materialize the intersection set; `SINTERCARD` with a limit
	/// is the constant-memory primitive for that, as opposed to `SINTER`
	/// followed by a length check.
	pub async fn sets_intersect(&self, a: &str, b: &str) -> Result<bool> {
		self.with_timeout(async {
			let mut conn = self.conn().await?;
			let count: u64 = redis::cmd("SINTERCARD")
				.arg(2)
				.arg(a)
				.arg(b)
				.arg("LIMIT")
				.arg(1)
				.query_async(&mut conn)
				.await?;
			Ok(count > 0)
		})
		.await
	}
}
