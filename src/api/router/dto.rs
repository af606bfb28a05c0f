//! Request bodies for the HTTP surface. Identity (`owner_id`,
//! `requester_id`, `user_id`) travels as an explicit request field rather
//! than through an auth layer, since an authentication provider is out of
//! scope; callers are trusted to assert their own id.

use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CreateTimerRequest {
	pub owner_id: String,
	pub target_instant: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ViewQuery {
	pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangeTargetRequest {
	pub requester_id: String,
	pub new_target_time: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct SaveTimestampRequest {
	pub user_id: String,
	pub target_at_save: DateTime<Utc>,
	#[serde(default)]
	pub meta: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct ForceCompleteRequest {
	pub requester_id: String,
}
