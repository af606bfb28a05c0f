//! Handler implementations and router assembly for the HTTP surface,
//! mounted under `/api/v1`.

mod dto;
mod handlers;

use std::sync::Arc;

use axum::{
	Router,
	routing::{get, post, put},
};
use echotimer_service::Services;

use crate::ws;

#[must_use]
pub fn build(services: Arc<Services>) -> Router {
	let api = Router::new()
		.route("/timers", post(handlers::create_timer))
		.route("/timers/{id}", get(handlers::get_timer))
		.route("/timers/shared/{share_token}", get(handlers::get_timer_by_token))
		.route("/timers/{id}/target-time", put(handlers::change_target))
		.route("/timers/{id}/timestamps", post(handlers::save_timestamp))
		.route("/timers/{id}/history", get(handlers::history))
		.route("/timers/{id}/users/{user_id}/history", get(handlers::history_for_user))
		.route("/timers/{id}/complete", post(handlers::force_complete))
		.route("/monitoring/completion-stats", get(handlers::completion_stats))
		.route("/monitoring/detect-missed-timers", post(handlers::detect_missed_timers));

	Router::new()
		.nest("/api/v1", api)
		.route("/ws/timer/{timer_id}", get(ws::upgrade))
		.with_state(services)
}
