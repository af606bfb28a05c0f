//! In-process message passing that breaks the scheduler/dispatcher cycle:
//! the scheduler publishes a `CompletionSignal` record on an internal
//! channel consumed by the core; the core publishes `ScheduleRequest
//! {SCHEDULE|UPDATE|CANCEL, timer}` on another channel consumed by the
//! scheduler. No direct reference either way. Built on `loole`.

use echotimer_core::{Result, model::Timer};
use loole::{Receiver, Sender};
use tokio::sync::oneshot;

/// Emitted by the TTL Scheduler when it wins the completion mutex for a
/// timer; consumed by TimerCore's `onCompletionSignal`. Carries a reply
/// channel so the scheduler learns the real outcome of the completion
/// transaction for its `CompletionLog`: on success update the log, on
/// failure update `errorMessage`.
#[derive(Debug)]
pub struct CompletionSignal {
	pub timer_id: String,
	pub reply: oneshot::Sender<Result<()>>,
}

/// Emitted by TimerCore (4.C) whenever a timer is created or its target
/// changes or it's explicitly cancelled; consumed by the TTL Scheduler
/// (4.B), which applies it via `schedule`/`update`/`cancel`.
#[derive(Debug, Clone)]
pub enum ScheduleRequest {
	Schedule(Timer),
	Update(Timer),
	Cancel { timer_id: String },
}

pub struct Channels {
	pub completion_signal: (Sender<CompletionSignal>, Receiver<CompletionSignal>),
	pub schedule_request: (Sender<ScheduleRequest>, Receiver<ScheduleRequest>),
}

impl Default for Channels {
	fn default() -> Self {
		Self {
			completion_signal: loole::unbounded(),
			schedule_request: loole::unbounded(),
		}
	}
}

impl Channels {
	#[must_use]
	pub fn new() -> Self { Self::default() }
}
