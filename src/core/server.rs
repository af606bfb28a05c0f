//! The `Server` handle: config plus a cooperative shutdown signal, threaded
//! through every `Service::build` call.

use std::sync::{
	Arc,
	atomic::{AtomicBool, Ordering},
};

use tokio::sync::Notify;

use crate::Config;

pub struct Server {
	pub config: Config,
	running: AtomicBool,
	shutdown: Notify,
}

impl Server {
	#[must_use]
	pub fn new(config: Config) -> Arc<Self> {
		Arc::new(Self {
			config,
			running: AtomicBool::new(true),
			shutdown: Notify::new(),
		})
	}

	#[must_use]
	pub fn running(&self) -> bool { self.running.load(Ordering::Acquire) }

	/// Signal every `Service::worker` loop to stop. Idempotent.
	pub fn shutdown(&self) {
		if self.running.swap(false, Ordering::AcqRel) {
			self.shutdown.notify_waiters();
		}
	}

	/// Resolves once [`Server::shutdown`] has been called. `Service` workers
	/// select on this alongside their own event sources.
	pub async fn until_shutdown(&self) {
		if !self.running() {
			return;
		}
		self.shutdown.notified().await;
	}
}
