use std::sync::Arc;

use axum::{
	Json,
	extract::{Path, Query, State},
};
use chrono::Utc;
use echotimer_core::model::{MissedCompletion, TimerView, TimestampMark};
use echotimer_service::Services;
use echotimer_store::postgres::CompletionStats;

use super::dto::{
	ChangeTargetRequest, CreateTimerRequest, ForceCompleteRequest, SaveTimestampRequest, ViewQuery,
};
use crate::error::ApiError;

pub async fn create_timer(
	State(services): State<Arc<Services>>,
	Json(req): Json<CreateTimerRequest>,
) -> Result<Json<TimerView>, ApiError> {
	let timer = services.dispatcher.create(req.target_instant, &req.owner_id).await?;
	let view = services.dispatcher.get_by_id_or_token(&timer.timer_id, &req.owner_id).await?;
	Ok(Json(view))
}

pub async fn get_timer(
	State(services): State<Arc<Services>>,
	Path(id): Path<String>,
	Query(query): Query<ViewQuery>,
) -> Result<Json<TimerView>, ApiError> {
	let view = services.dispatcher.get_by_id_or_token(&id, &query.user_id).await?;
	Ok(Json(view))
}

pub async fn get_timer_by_token(
	State(services): State<Arc<Services>>,
	Path(share_token): Path<String>,
	Query(query): Query<ViewQuery>,
) -> Result<Json<TimerView>, ApiError> {
	let view = services.dispatcher.get_by_id_or_token(&share_token, &query.user_id).await?;
	Ok(Json(view))
}

pub async fn change_target(
	State(services): State<Arc<Services>>,
	Path(id): Path<String>,
	Json(req): Json<ChangeTargetRequest>,
) -> Result<Json<TimerView>, ApiError> {
	let view = services
		.dispatcher
		.change_target(&id, req.new_target_time, &req.requester_id)
		.await?;
	Ok(Json(view))
}

pub async fn save_timestamp(
	State(services): State<Arc<Services>>,
	Path(id): Path<String>,
	Json(req): Json<SaveTimestampRequest>,
) -> Result<Json<TimestampMark>, ApiError> {
	let mark = services
		.dispatcher
		.save_timestamp(&id, &req.user_id, req.target_at_save, req.meta)
		.await?;
	Ok(Json(mark))
}

pub async fn history(
	State(services): State<Arc<Services>>,
	Path(id): Path<String>,
) -> Result<Json<Vec<TimestampMark>>, ApiError> {
	let marks = services.pg.list_marks(&id).await?;
	Ok(Json(marks))
}

pub async fn history_for_user(
	State(services): State<Arc<Services>>,
	Path((id, user_id)): Path<(String, String)>,
) -> Result<Json<Vec<TimestampMark>>, ApiError> {
	let marks = services.pg.list_marks_for_user(&id, &user_id).await?;
	Ok(Json(marks))
}

pub async fn force_complete(
	State(services): State<Arc<Services>>,
	Path(id): Path<String>,
	Json(req): Json<ForceCompleteRequest>,
) -> Result<Json<TimerView>, ApiError> {
	let view = services.dispatcher.force_complete(&id, &req.requester_id).await?;
	Ok(Json(view))
}

/// 1-hour completion stats.
pub async fn completion_stats(
	State(services): State<Arc<Services>>,
) -> Result<Json<CompletionStats>, ApiError> {
	let since = Utc::now() - chrono::Duration::hours(1);
	let stats = services.pg.completion_stats_since(since).await?;
	Ok(Json(stats))
}

pub async fn detect_missed_timers(
	State(services): State<Arc<Services>>,
) -> Result<Json<Vec<MissedCompletion>>, ApiError> {
	let findings = services.monitor.detect().await?;
	Ok(Json(findings))
}
