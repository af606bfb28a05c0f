//! Session transport: one WebSocket per session, STOMP-like publish
//! destinations from the client (`{"dest": "...", "body": {...}}`), plain
//! tagged-union envelopes pushed to subscribers.

use std::sync::Arc;

use axum::{
	extract::{
		Path, Query, State,
		ws::{Message, WebSocket, WebSocketUpgrade},
	},
	response::Response,
};
use axum_extra::{TypedHeader, headers::Header};
use echotimer_service::Services;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
	pub user_id: Option<String>,
}

/// `userId` connect-frame header: optional, may carry a `userId`. The query
/// parameter is equivalent and takes precedence when both are set, since
/// it's visible in the upgrade request line during manual testing.
struct UserIdHeader(String);

static USER_ID_HEADER_NAME: http::HeaderName = http::HeaderName::from_static("userid");

impl Header for UserIdHeader {
	fn name() -> &'static http::HeaderName {
		&USER_ID_HEADER_NAME
	}

	fn decode<'i, I>(values: &mut I) -> Result<Self, axum_extra::headers::Error>
	where
		I: Iterator<Item = &'i http::HeaderValue>,
	{
		let value = values.next().ok_or_else(axum_extra::headers::Error::invalid)?;
		let s = value.to_str().map_err(|_| axum_extra::headers::Error::invalid())?;
		Ok(UserIdHeader(s.to_owned()))
	}

	fn encode<E: Extend<http::HeaderValue>>(&self, values: &mut E) {
		if let Ok(value) = http::HeaderValue::from_str(&self.0) {
			values.extend(std::iter::once(value));
		}
	}
}

#[derive(Debug, Deserialize)]
struct ClientFrame {
	dest: String,
	body: serde_json::Value,
}

pub async fn upgrade(
	State(services): State<Arc<Services>>,
	Path(timer_id): Path<String>,
	Query(query): Query<ConnectQuery>,
	header: Option<TypedHeader<UserIdHeader>>,
	ws: WebSocketUpgrade,
) -> Response {
	let user_id = query.user_id.or_else(|| header.map(|TypedHeader(h)| h.0));
	ws.on_upgrade(move |socket| handle(socket, services, timer_id, user_id))
}

async fn handle(socket: WebSocket, services: Arc<Services>, timer_id: String, user_id: Option<String>) {
	let session_id = Uuid::new_v4().to_string();
	// If absent, the server derives one from sessionId: stable per session
	// since it's a pure function of `session_id`.
	let user_id = user_id.unwrap_or_else(|| format!("anon-{session_id}"));

	if let Err(e) = services
		.dispatcher
		.on_session_connected(&timer_id, &user_id, &session_id)
		.await
	{
		warn!(timer_id, user_id, error = %e, "session connect failed");
		return;
	}

	let mut receiver = services.sessions.subscribe(&timer_id, &session_id).await;
	let (mut sink, mut stream) = socket.split();

	let push_task = async move {
		while let Some(envelope) = receiver.recv().await {
			let Ok(json) = serde_json::to_string(&envelope) else { continue };
			if sink.send(Message::Text(json.into())).await.is_err() {
				break;
			}
		}
	};

	let recv_task = {
		let services = Arc::clone(&services);
		let timer_id = timer_id.clone();
		let user_id = user_id.clone();
		async move {
			while let Some(Ok(message)) = stream.next().await {
				let Message::Text(text) = message else { continue };
				if let Err(e) = dispatch_client_frame(&services, &timer_id, &user_id, &text).await {
					warn!(timer_id = %timer_id, error = %e, "client frame rejected");
				}
			}
		}
	};

	// TTLs are refreshed opportunistically on every client heartbeat so
	// active state never dies. A live connection has no other occasion to
	// send one, so the server drives it on a period well inside the
	// shortest presence TTL (`online_users`, 30 min).
	let heartbeat_task = {
		let services = Arc::clone(&services);
		let session_id = session_id.clone();
		async move {
			let mut ticker = tokio::time::interval(std::time::Duration::from_secs(60));
			ticker.tick().await; // first tick fires immediately; skip it
			loop {
				ticker.tick().await;
				if let Err(e) = services.dispatcher.presence().heartbeat(&session_id).await {
					warn!(session_id, error = %e, "heartbeat refresh failed");
				}
			}
		}
	};

	tokio::select! {
		() = push_task => {},
		() = recv_task => {},
		() = heartbeat_task => {},
	}

	services.sessions.unsubscribe(&timer_id, &session_id).await;
	if let Err(e) = services
		.dispatcher
		.on_session_disconnected(&timer_id, &user_id, &session_id)
		.await
	{
		warn!(timer_id, session_id, error = %e, "session disconnect failed");
	}
	debug!(timer_id, session_id, "session closed");
}

async fn dispatch_client_frame(
	services: &Arc<Services>,
	timer_id: &str,
	user_id: &str,
	text: &str,
) -> echotimer_core::Result {
	let frame: ClientFrame =
		serde_json::from_str(text).map_err(|e| echotimer_core::Error::Invalid(e.to_string()))?;

	if frame.dest.ends_with("/save") {
		#[derive(Deserialize)]
		struct Save {
			target_at_save: chrono::DateTime<chrono::Utc>,
			#[serde(default)]
			meta: Option<serde_json::Value>,
		}
		let body: Save = serde_json::from_value(frame.body)
			.map_err(|e| echotimer_core::Error::Invalid(e.to_string()))?;
		services
			.dispatcher
			.save_timestamp(timer_id, user_id, body.target_at_save, body.meta)
			.await?;
	} else if frame.dest.ends_with("/change-target") {
		#[derive(Deserialize)]
		struct ChangeTarget {
			new_target_time: chrono::DateTime<chrono::Utc>,
		}
		let body: ChangeTarget = serde_json::from_value(frame.body)
			.map_err(|e| echotimer_core::Error::Invalid(e.to_string()))?;
		services
			.dispatcher
			.change_target(timer_id, body.new_target_time, user_id)
			.await?;
	} else if frame.dest.ends_with("/complete") {
		services.dispatcher.force_complete(timer_id, user_id).await?;
	} else {
		return Err(echotimer_core::Error::Invalid(format!("unknown destination {}", frame.dest)));
	}

	Ok(())
}
