//! Primary persistence: Timer, TimestampMark and CompletionLog rows.
//! TimerCore owns the first two; the TTL Scheduler and Reconciliation
//! Monitor own `completion_logs` writes/reads respectively. This module
//! just exposes the SQL operations; ownership is enforced by which
//! `echotimer_service` component calls them.
//!
//! Queries use the runtime-checked `query`/`query_as` API rather than the
//! `query!`/`query_as!` macros: the latter need a live database (or a
//! committed `.sqlx` offline cache) at *build* time, which this environment
//! doesn't have.

use chrono::{DateTime, Utc};
use echotimer_core::{
	Result,
	model::{CompletionLog, Timer, TimestampMark},
};
use sqlx::{PgPool, Row, postgres::PgPoolOptions};

#[derive(Clone)]
pub struct PgStore {
	pool: PgPool,
}

/// Aggregate counts backing `GET /monitoring/completion-stats`.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CompletionStats {
	pub total: i64,
	pub succeeded: i64,
	pub failed: i64,
	pub lock_not_acquired: i64,
}

const TIMER_COLUMNS: &str = "timer_id, owner_id, target_instant, created_at, updated_at, \
                              completed, completed_at, share_token";

const COMPLETION_LOG_COLUMNS: &str = "id, timer_id, server_id, notification_received_at, \
                                       processing_started_at, processing_completed_at, \
                                       lock_acquired, success, error_message, \
                                       original_target_instant, processing_delay_millis";

impl PgStore {
	pub async fn connect(url: &str) -> Result<Self> {
		let pool = PgPoolOptions::new()
			.max_connections(16)
			.connect(url)
			.await?;
		Ok(Self { pool })
	}

	pub(crate) fn pool(&self) -> &PgPool { &self.pool }

	pub async fn insert_timer(&self, timer: &Timer) -> Result {
		sqlx::query(
			"INSERT INTO timers (timer_id, owner_id, target_instant, created_at, updated_at, \
			 completed, completed_at, share_token) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
		)
		.bind(&timer.timer_id)
		.bind(&timer.owner_id)
		.bind(timer.target_instant)
		.bind(timer.created_at)
		.bind(timer.updated_at)
		.bind(timer.completed)
		.bind(timer.completed_at)
		.bind(&timer.share_token)
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	pub async fn get_timer(&self, timer_id: &str) -> Result<Option<Timer>> {
		let timer = sqlx::query_as::<_, Timer>(&format!(
			"SELECT {TIMER_COLUMNS} FROM timers WHERE timer_id = $1"
		))
		.bind(timer_id)
		.fetch_optional(&self.pool)
		.await?;

		Ok(timer)
	}

	pub async fn get_timer_by_token(&self, share_token: &str) -> Result<Option<Timer>> {
		let timer = sqlx::query_as::<_, Timer>(&format!(
			"SELECT {TIMER_COLUMNS} FROM timers WHERE share_token = $1"
		))
		.bind(share_token)
		.fetch_optional(&self.pool)
		.await?;

		Ok(timer)
	}

	/// Unconditional replace of `target_instant`/`updated_at`. Callers
	/// (TimerCore) are responsible for the `completed`/ownership checks
	/// `changeTarget` requires before calling this.
	pub async fn update_target(
		&self,
		timer_id: &str,
		target_instant: DateTime<Utc>,
		updated_at: DateTime<Utc>,
	) -> Result<Option<Timer>> {
		let timer = sqlx::query_as::<_, Timer>(&format!(
			"UPDATE timers SET target_instant = $2, updated_at = $3 WHERE timer_id = $1 \
			 RETURNING {TIMER_COLUMNS}"
		))
		.bind(timer_id)
		.bind(target_instant)
		.bind(updated_at)
		.fetch_optional(&self.pool)
		.await?;

		Ok(timer)
	}

	/// Idempotent: a timer already `completed=true` is left untouched, and
	/// the pre-existing row is returned; completion becomes a no-op.
	pub async fn complete_timer(
		&self,
		timer_id: &str,
		completed_at: DateTime<Utc>,
	) -> Result<Option<Timer>> {
		sqlx::query(
			"UPDATE timers SET completed = TRUE, completed_at = $2, updated_at = $2 WHERE \
			 timer_id = $1 AND completed = FALSE",
		)
		.bind(timer_id)
		.bind(completed_at)
		.execute(&self.pool)
		.await?;

		self.get_timer(timer_id).await
	}

	pub async fn insert_timestamp_mark(&self, mark: &TimestampMark) -> Result<TimestampMark> {
		let row = sqlx::query_as::<_, TimestampMark>(&format!(
			"INSERT INTO timestamp_marks (timer_id, user_id, saved_at, \
			 remaining_at_save_millis, target_at_save, meta) VALUES ($1, $2, $3, $4, $5, $6) \
			 RETURNING id, timer_id, user_id, saved_at, remaining_at_save_millis, \
			 target_at_save, meta"
		))
		.bind(&mark.timer_id)
		.bind(&mark.user_id)
		.bind(mark.saved_at)
		.bind(mark.remaining_at_save_millis)
		.bind(mark.target_at_save)
		.bind(&mark.meta)
		.fetch_one(&self.pool)
		.await?;

		Ok(row)
	}

	pub async fn list_marks(&self, timer_id: &str) -> Result<Vec<TimestampMark>> {
		let rows = sqlx::query_as::<_, TimestampMark>(
			"SELECT id, timer_id, user_id, saved_at, remaining_at_save_millis, target_at_save, \
			 meta FROM timestamp_marks WHERE timer_id = $1 ORDER BY saved_at ASC",
		)
		.bind(timer_id)
		.fetch_all(&self.pool)
		.await?;

		Ok(rows)
	}

	pub async fn list_marks_for_user(
		&self,
		timer_id: &str,
		user_id: &str,
	) -> Result<Vec<TimestampMark>> {
		let rows = sqlx::query_as::<_, TimestampMark>(
			"SELECT id, timer_id, user_id, saved_at, remaining_at_save_millis, target_at_save, \
			 meta FROM timestamp_marks WHERE timer_id = $1 AND user_id = $2 ORDER BY saved_at \
			 ASC",
		)
		.bind(timer_id)
		.bind(user_id)
		.fetch_all(&self.pool)
		.await?;

		Ok(rows)
	}

	/// One row per completion attempt: one attempt per server per
	/// notification.
	pub async fn insert_completion_log(&self, log: &CompletionLog) -> Result<i64> {
		let row = sqlx::query(
			"INSERT INTO completion_logs (timer_id, server_id, notification_received_at, \
			 processing_started_at, processing_completed_at, lock_acquired, success, \
			 error_message, original_target_instant, processing_delay_millis) VALUES ($1, $2, \
			 $3, $4, $5, $6, $7, $8, $9, $10) RETURNING id",
		)
		.bind(&log.timer_id)
		.bind(&log.server_id)
		.bind(log.notification_received_at)
		.bind(log.processing_started_at)
		.bind(log.processing_completed_at)
		.bind(log.lock_acquired)
		.bind(log.success)
		.bind(&log.error_message)
		.bind(log.original_target_instant)
		.bind(log.processing_delay_millis)
		.fetch_one(&self.pool)
		.await?;

		Ok(row.get::<i64, _>("id"))
	}

	#[expect(clippy::too_many_arguments)]
	pub async fn update_completion_log(
		&self,
		id: i64,
		lock_acquired: bool,
		processing_started_at: Option<DateTime<Utc>>,
		processing_completed_at: Option<DateTime<Utc>>,
		success: bool,
		error_message: Option<&str>,
		processing_delay_millis: Option<i64>,
	) -> Result {
		sqlx::query(
			"UPDATE completion_logs SET lock_acquired = $2, processing_started_at = $3, \
			 processing_completed_at = $4, success = $5, error_message = $6, \
			 processing_delay_millis = $7 WHERE id = $1",
		)
		.bind(id)
		.bind(lock_acquired)
		.bind(processing_started_at)
		.bind(processing_completed_at)
		.bind(success)
		.bind(error_message)
		.bind(processing_delay_millis)
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	pub async fn completion_logs_for_timer(&self, timer_id: &str) -> Result<Vec<CompletionLog>> {
		let rows = sqlx::query_as::<_, CompletionLog>(&format!(
			"SELECT {COMPLETION_LOG_COLUMNS} FROM completion_logs WHERE timer_id = $1 ORDER BY \
			 notification_received_at ASC"
		))
		.bind(timer_id)
		.fetch_all(&self.pool)
		.await?;

		Ok(rows)
	}

	/// Timers whose target passed within the reconciliation window and
	/// which are not yet marked completed.
	pub async fn timers_due_for_reconciliation(
		&self,
		now: DateTime<Utc>,
		window_secs: i64,
	) -> Result<Vec<Timer>> {
		let since = now - chrono::Duration::seconds(window_secs);
		let rows = sqlx::query_as::<_, Timer>(&format!(
			"SELECT {TIMER_COLUMNS} FROM timers WHERE completed = FALSE AND target_instant < \
			 $1 AND target_instant > $2"
		))
		.bind(now)
		.bind(since)
		.fetch_all(&self.pool)
		.await?;

		Ok(rows)
	}

	/// Backs `GET /monitoring/completion-stats`'s 1-hour stats aggregate.
	pub async fn completion_stats_since(&self, since: DateTime<Utc>) -> Result<CompletionStats> {
		let row = sqlx::query(
			"SELECT COUNT(*) AS total, COUNT(*) FILTER (WHERE success) AS succeeded, COUNT(*) \
			 FILTER (WHERE NOT success AND lock_acquired) AS failed, COUNT(*) FILTER (WHERE \
			 NOT lock_acquired) AS lock_not_acquired FROM completion_logs WHERE \
			 notification_received_at >= $1",
		)
		.bind(since)
		.fetch_one(&self.pool)
		.await?;

		Ok(CompletionStats {
			total: row.get("total"),
			succeeded: row.get("succeeded"),
			failed: row.get("failed"),
			lock_not_acquired: row.get("lock_not_acquired"),
		})
	}
}

#[cfg(test)]
mod tests {
	use chrono::Utc;

	use super::*;

	/// Create → complete → reconciliation-scan round trip against a real
	/// database, covering the `timers`/`completion_logs` schema migrated by
	/// `store::migrations::run`. Requires `DATABASE_URL`, already migrated.
	#[tokio::test]
	#[ignore = "requires a running Postgres at DATABASE_URL"]
	async fn insert_and_complete_timer_round_trips() {
		let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for this test");
		let store = PgStore::connect(&url).await.expect("connect");

		let now = Utc::now();
		let timer = Timer {
			timer_id: format!("test-timer-{}", uuid::Uuid::new_v4()),
			owner_id: "owner".into(),
			target_instant: now - chrono::Duration::seconds(30),
			created_at: now,
			updated_at: now,
			completed: false,
			completed_at: None,
			share_token: format!("test-token-{}", uuid::Uuid::new_v4()),
		};

		store.insert_timer(&timer).await.expect("insert_timer");

		let due = store
			.timers_due_for_reconciliation(now, 5 * 60)
			.await
			.expect("timers_due_for_reconciliation");
		assert!(due.iter().any(|t| t.timer_id == timer.timer_id));

		let completed = store
			.complete_timer(&timer.timer_id, now)
			.await
			.expect("complete_timer")
			.expect("timer row exists");
		assert!(completed.completed);

		// Idempotent: completing an already-completed timer is a no-op.
		let completed_again = store
			.complete_timer(&timer.timer_id, now + chrono::Duration::seconds(5))
			.await
			.expect("complete_timer again")
			.expect("timer row exists");
		assert_eq!(completed_again.completed_at, completed.completed_at);
	}
}
