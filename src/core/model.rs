//! The core entities, shared verbatim between the store layer (which
//! persists them) and the api layer (which serializes them). Field names
//! are `snake_case` Rust conventions for the same concepts the design names
//! in `camelCase` prose (`targetInstant` -> `target_instant`, etc).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role returned alongside a timer view (`getByIdOrToken`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
	Owner,
	Viewer,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct Timer {
	pub timer_id: String,
	pub owner_id: String,
	pub target_instant: DateTime<Utc>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
	pub completed: bool,
	pub completed_at: Option<DateTime<Utc>>,
	pub share_token: String,
}

/// Append-only, scoped to a `(timerId, userId)` pair.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct TimestampMark {
	pub id: i64,
	pub timer_id: String,
	pub user_id: String,
	pub saved_at: DateTime<Utc>,
	/// `remaining_at_save = max(0, target_at_save - saved_at)`, stored as
	/// whole milliseconds.
	pub remaining_at_save_millis: i64,
	pub target_at_save: DateTime<Utc>,
	pub meta: Option<serde_json::Value>,
}

/// One completion attempt by one server for one expiry notification: zero
/// or many per timer (zero means the notification was lost; more than one
/// means a multi-server race with only one winner).
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct CompletionLog {
	pub id: i64,
	pub timer_id: String,
	pub server_id: String,
	pub notification_received_at: DateTime<Utc>,
	pub processing_started_at: Option<DateTime<Utc>>,
	pub processing_completed_at: Option<DateTime<Utc>>,
	pub lock_acquired: bool,
	pub success: bool,
	pub error_message: Option<String>,
	pub original_target_instant: DateTime<Utc>,
	pub processing_delay_millis: Option<i64>,
}

/// Internal diagnostic classes produced by the Reconciliation Monitor.
/// Never surfaced to end users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MissedCompletionKind {
	NotificationLost,
	LockContentionLost,
	ProcessingFailed,
	CommitDivergence,
}

/// One finding emitted per reconciliation pass: a structured error record
/// per case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissedCompletion {
	pub timer_id: String,
	pub kind: MissedCompletionKind,
	pub detail: Option<String>,
}

/// A `(timerId, userId)` presence session. Held only in the shared store,
/// never persisted to primary storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceSession {
	pub session_id: String,
	pub timer_id: String,
	pub user_id: String,
	pub server_id: String,
	pub connected_at: DateTime<Utc>,
	pub last_heartbeat: DateTime<Utc>,
}

/// The snapshot TimerCore's `getByIdOrToken` returns: the persisted `Timer`
/// fields plus everything derived at read time (server clock, remaining
/// duration, online count, and the caller's role).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerView {
	pub timer_id: String,
	pub owner_id: String,
	pub share_token: String,
	pub target_instant: DateTime<Utc>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
	pub completed: bool,
	pub completed_at: Option<DateTime<Utc>>,
	pub server_now: DateTime<Utc>,
	pub remaining_millis: i64,
	pub online_count: u64,
	pub role: Role,
}
