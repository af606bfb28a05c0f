//! The wire/bus event envelope: events are represented as a tagged union
//! keyed by `eventType`, and the wire format carries that tag. No runtime
//! type introspection; dispatch is explicit.
//!
//! One enum, `serde`'s internally-tagged representation on `eventType`,
//! covers both the Fleet Event Bus wire format and the session-transport
//! push frames, since they share the same JSON envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use echotimer_store::redis::BusTopic;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "eventType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventPayload {
	TargetTimeChanged {
		new_target_time: DateTime<Utc>,
	},
	TimestampSaved {
		user_id: String,
		saved_at: DateTime<Utc>,
	},
	UserJoined {
		user_id: String,
	},
	UserLeft {
		user_id: String,
	},
	TimerCompleted {
		owner_id: String,
		online_count: u64,
	},
	SharedTimerAccessed {
		joiner_id: String,
	},
	OnlineUserCountUpdated {
		online_count: u64,
	},
}

impl EventPayload {
	/// These three classes bypass the `isServerRelevant` presence filter
	/// and are dispatched on every server unconditionally, because the
	/// owner may be the only viewer on a given server.
	#[must_use]
	pub const fn always_dispatch(&self) -> bool {
		matches!(
			self,
			Self::TargetTimeChanged { .. }
				| Self::TimerCompleted { .. }
				| Self::SharedTimerAccessed { .. }
		)
	}

	/// Which Fleet Event Bus topic an event publishes on.
	/// `OnlineUserCountUpdated` never goes on the bus; it emits an
	/// `ONLINE_USER_COUNT_UPDATED` control message directly into the
	/// local-session transport, not the fleet bus. `None` here marks that.
	#[must_use]
	pub const fn bus_topic(&self) -> Option<BusTopic> {
		match self {
			| Self::TargetTimeChanged { .. }
			| Self::TimerCompleted { .. }
			| Self::SharedTimerAccessed { .. } => Some(BusTopic::TimerEvents),
			| Self::UserJoined { .. } | Self::UserLeft { .. } | Self::TimestampSaved { .. } =>
				Some(BusTopic::UserActions),
			| Self::OnlineUserCountUpdated { .. } => None,
		}
	}
}

/// The common envelope fields every event carries: `{eventType, eventId,
/// timerId, timestamp, originServerId, ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
	pub event_id: Uuid,
	pub timer_id: String,
	pub timestamp: DateTime<Utc>,
	pub origin_server_id: String,
	#[serde(flatten)]
	pub payload: EventPayload,
}

impl Envelope {
	#[must_use]
	pub fn new(timer_id: impl Into<String>, origin_server_id: impl Into<String>, payload: EventPayload) -> Self {
		Self {
			event_id: Uuid::new_v4(),
			timer_id: timer_id.into(),
			timestamp: Utc::now(),
			origin_server_id: origin_server_id.into(),
			payload,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn always_dispatch_matches_bypass_set() {
		assert!(EventPayload::TargetTimeChanged { new_target_time: Utc::now() }.always_dispatch());
		assert!(EventPayload::TimerCompleted { owner_id: "u1".into(), online_count: 0 }.always_dispatch());
		assert!(EventPayload::SharedTimerAccessed { joiner_id: "u2".into() }.always_dispatch());
		assert!(!EventPayload::UserJoined { user_id: "u3".into() }.always_dispatch());
		assert!(!EventPayload::TimestampSaved { user_id: "u3".into(), saved_at: Utc::now() }.always_dispatch());
	}

	#[test]
	fn online_count_update_never_hits_the_bus() {
		assert!(EventPayload::OnlineUserCountUpdated { online_count: 3 }.bus_topic().is_none());
	}

	#[test]
	fn envelope_round_trips_through_json() {
		let env = Envelope::new("t1", "server-a", EventPayload::UserJoined { user_id: "u1".into() });
		let json = serde_json::to_string(&env).expect("serialize");
		let back: Envelope = serde_json::from_str(&json).expect("deserialize");
		assert_eq!(back.timer_id, "t1");
		assert!(matches!(back.payload, EventPayload::UserJoined { .. }));
	}
}
