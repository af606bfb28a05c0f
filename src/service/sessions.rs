//! The in-process session registry: which locally-connected sessions are
//! subscribed to which `timerId`, and how to push an event envelope to
//! them. This is distinct from the Presence Index, which is fleet-wide
//! state held in the shared store; this registry is purely local to one
//! server process and is what "push the event onto every matching session"
//! actually does.
//!
//! The websocket layer in `echotimer_api` registers a sender per connected
//! session on subscribe and deregisters it on disconnect; `TimerCore` and
//! the Fleet Event Bus consumer both push through here for local fan-out.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{RwLock, mpsc};

use crate::events::Envelope;

/// Bounded so a slow/stalled client can't grow memory unboundedly. Session
/// transport writes are allowed to buffer and back-pressure per connection;
/// a full channel just drops the oldest-pressure event rather than
/// blocking dispatch.
const SESSION_CHANNEL_CAPACITY: usize = 256;

pub type EventSender = mpsc::Sender<Envelope>;
pub type EventReceiver = mpsc::Receiver<Envelope>;

#[derive(Default)]
pub struct Sessions {
	/// timerId -> sessionId -> sender. A session only ever subscribes to
	/// one timer over its lifetime: the subscribe destination
	/// `timer/{timerId}` is fixed per connection.
	by_timer: RwLock<HashMap<String, HashMap<String, EventSender>>>,
}

impl Sessions {
	#[must_use]
	pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

	/// Registers a new local session and returns the receiving half of its
	/// channel for the websocket write loop to drain.
	pub async fn subscribe(&self, timer_id: &str, session_id: &str) -> EventReceiver {
		let (tx, rx) = mpsc::channel(SESSION_CHANNEL_CAPACITY);
		self.by_timer
			.write()
			.await
			.entry(timer_id.to_owned())
			.or_default()
			.insert(session_id.to_owned(), tx);
		rx
	}

	pub async fn unsubscribe(&self, timer_id: &str, session_id: &str) {
		let mut guard = self.by_timer.write().await;
		if let Some(sessions) = guard.get_mut(timer_id) {
			sessions.remove(session_id);
			if sessions.is_empty() {
				guard.remove(timer_id);
			}
		}
	}

	/// `true` iff this server process has at least one locally subscribed
	/// session for `timerId`. A cheap local complement to the Presence
	/// Index's fleet-wide `isServerRelevant`, used by callers that already
	/// hold the registry and don't want a store round-trip (e.g. deciding
	/// whether to bother building an envelope at all).
	pub async fn has_local_subscribers(&self, timer_id: &str) -> bool {
		self.by_timer
			.read()
			.await
			.get(timer_id)
			.is_some_and(|sessions| !sessions.is_empty())
	}

	/// Push `envelope` to every session locally subscribed to its
	/// `timer_id`. Best-effort: a closed or full channel is skipped rather
	/// than erroring, matching the bus consumer's continue-on-error failure
	/// semantics.
	pub async fn push(&self, envelope: &Envelope) {
		let guard = self.by_timer.read().await;
		let Some(sessions) = guard.get(&envelope.timer_id) else {
			return;
		};

		for sender in sessions.values() {
			_ = sender.try_send(envelope.clone());
		}
	}
}

#[cfg(test)]
mod tests {
	use crate::events::EventPayload;

	use super::*;

	#[tokio::test]
	async fn push_reaches_only_subscribed_timer() {
		let sessions = Sessions::new();
		let mut rx = sessions.subscribe("t1", "s1").await;

		let env = Envelope::new("t1", "server-a", EventPayload::UserJoined { user_id: "u1".into() });
		sessions.push(&env).await;
		assert!(rx.try_recv().is_ok());

		let other = Envelope::new("t2", "server-a", EventPayload::UserJoined { user_id: "u1".into() });
		sessions.push(&other).await;
		assert!(rx.try_recv().is_err());
	}

	#[tokio::test]
	async fn unsubscribe_removes_session_from_fanout() {
		let sessions = Sessions::new();
		let mut rx = sessions.subscribe("t1", "s1").await;
		sessions.unsubscribe("t1", "s1").await;

		let env = Envelope::new("t1", "server-a", EventPayload::UserJoined { user_id: "u1".into() });
		sessions.push(&env).await;
		assert!(rx.try_recv().is_err());
		assert!(!sessions.has_local_subscribers("t1").await);
	}
}
