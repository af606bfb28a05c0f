//! Reconciliation Monitor: periodically joins the timer collection against
//! the completion-log collection to find timers whose target passed but
//! which were never successfully completed, classifying the failure mode.
//! An observability surface only: no auto-retry. The monitor feeds alerts,
//! with manual or policy-driven remediation.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use echotimer_core::{
	Result, Server,
	model::{MissedCompletion, MissedCompletionKind},
};
use echotimer_store::PgStore;
use tracing::warn;

use crate::{Args, Service as _, make_name};

pub struct Service {
	server: Arc<Server>,
	pg: PgStore,
	interval_secs: u64,
	window_secs: i64,
}

#[async_trait]
impl crate::Service for Service {
	fn build(args: &Args<'_>) -> Result<Arc<Self>> {
		Ok(Arc::new(Self {
			server: Arc::clone(args.server),
			pg: args.pg.clone(),
			interval_secs: args.server.config.monitor_interval_secs,
			window_secs: args.server.config.monitor_window_secs,
		}))
	}

	/// Runs on every server, once per minute. Selects against
	/// `Server::until_shutdown` so the loop actually exits when
	/// `Manager::stop` interrupts the fleet instead of running forever.
	async fn worker(self: Arc<Self>) -> Result {
		let mut ticker = tokio::time::interval(Duration::from_secs(self.interval_secs));
		loop {
			tokio::select! {
				_ = ticker.tick() => {},
				() = self.server.until_shutdown() => return Ok(()),
			}

			match self.detect().await {
				| Ok(findings) =>
					for finding in &findings {
						warn!(
							timer_id = %finding.timer_id,
							kind = ?finding.kind,
							detail = ?finding.detail,
							"missed completion detected"
						);
					},
				| Err(e) => warn!(error = %e, "reconciliation pass failed"),
			}
		}
	}

	fn name(&self) -> &str { make_name(std::module_path!()) }
}

impl Service {
	/// Scans for missed completions and classifies each one. Also the
	/// target of `POST /monitoring/detect-missed-timers` for an on-demand
	/// pass outside the regular 1-minute cadence.
	pub async fn detect(&self) -> Result<Vec<MissedCompletion>> {
		let now = echotimer_core::time::now();
		let due = self.pg.timers_due_for_reconciliation(now, self.window_secs).await?;

		let mut findings = Vec::new();
		for timer in due {
			let logs = self.pg.completion_logs_for_timer(&timer.timer_id).await?;

			let has_success = logs.iter().any(|l| l.success);
			if has_success {
				// The Timer row is still `completed=false` (it passed the
				// query's `completed=false` filter) despite a log
				// recording a successful commit: the winner crashed
				// between emitting the completion and persisting the
				// flag.
				findings.push(MissedCompletion {
					timer_id: timer.timer_id,
					kind: MissedCompletionKind::CommitDivergence,
					detail: None,
				});
				continue;
			}

			let kind = match logs.last() {
				| None => MissedCompletionKind::NotificationLost,
				| Some(_) if logs.iter().all(|l| !l.lock_acquired) =>
					MissedCompletionKind::LockContentionLost,
				| Some(latest) if latest.lock_acquired && !latest.success =>
					MissedCompletionKind::ProcessingFailed,
				| Some(_) => MissedCompletionKind::LockContentionLost,
			};

			let detail = logs.last().and_then(|l| l.error_message.clone());
			findings.push(MissedCompletion { timer_id: timer.timer_id, kind, detail });
		}

		Ok(findings)
	}
}

#[cfg(test)]
mod tests {
	use chrono::Utc;
	use echotimer_core::model::CompletionLog;

	fn log(lock_acquired: bool, success: bool) -> CompletionLog {
		CompletionLog {
			id: 1,
			timer_id: "t1".into(),
			server_id: "s1".into(),
			notification_received_at: Utc::now(),
			processing_started_at: None,
			processing_completed_at: None,
			lock_acquired,
			success,
			error_message: None,
			original_target_instant: Utc::now(),
			processing_delay_millis: None,
		}
	}

	#[test]
	fn classification_shapes_match_spec() {
		// No log at all -> NOTIFICATION_LOST.
		let logs: Vec<CompletionLog> = vec![];
		assert!(logs.last().is_none());

		// All logs lock_acquired=false -> LOCK_CONTENTION_LOST.
		let logs = vec![log(false, false), log(false, false)];
		assert!(logs.iter().all(|l| !l.lock_acquired));

		// Latest lock_acquired=true, success=false -> PROCESSING_FAILED.
		let logs = vec![log(false, false), log(true, false)];
		let latest = logs.last().unwrap();
		assert!(latest.lock_acquired && !latest.success);
	}
}
