//! Spawns and supervises every component's `worker()` loop: one task per
//! service, joined on shutdown, with an early-exit/error from any one task
//! treated as a reason to interrupt the rest rather than let the fleet
//! limp along half-running.

use std::sync::Arc;

use echotimer_core::{Error, Result, Server};
use tokio::{sync::Mutex, task::JoinSet};
use tracing::{debug, error, info};

use crate::Service;

pub struct Manager {
	server: Arc<Server>,
	services: Vec<Arc<dyn Service>>,
	workers: Mutex<JoinSet<(String, Result)>>,
}

impl Manager {
	#[must_use]
	pub fn new(server: &Arc<Server>, services: Vec<Arc<dyn Service>>) -> Arc<Self> {
		Arc::new(Self { server: Arc::clone(server), services, workers: Mutex::new(JoinSet::new()) })
	}

	/// Spawns every service's `worker()` and returns once they're all
	/// running; does not block until they finish.
	pub async fn start(self: &Arc<Self>) -> Result {
		let mut workers = self.workers.lock().await;
		for service in &self.services {
			let name = service.name().to_owned();
			let service = Arc::clone(service);
			debug!(service = %name, "starting worker");
			workers.spawn(async move {
				let result = service.worker().await;
				(name, result)
			});
		}

		Ok(())
	}

	/// Watches for a worker exiting before shutdown was requested and
	/// triggers a fleet-wide shutdown if one does, rather than let the
	/// fleet limp along with a dead component. Spawned alongside `start`;
	/// resolves once shutdown is signalled, by whichever path got there
	/// first.
	pub async fn watch(self: Arc<Self>) {
		tokio::select! {
			() = self.server.until_shutdown() => {},
			outcome = self.wait_for_first_exit() => {
				match outcome {
					| Some((name, Err(e))) => error!(service = %name, error = %e, "worker exited with error"),
					| Some((name, Ok(()))) => debug!(service = %name, "worker exited"),
					| None => {},
				}
				self.server.shutdown();
			},
		}
	}

	async fn wait_for_first_exit(&self) -> Option<(String, Result)> {
		let mut workers = self.workers.lock().await;
		workers.join_next().await.map(|r| r.unwrap_or_else(|e| ("unknown".to_owned(), Err(Error::Internal(e.to_string())))))
	}

	/// Cooperative interrupt for every service, then join whatever workers
	/// remain.
	pub async fn stop(&self) -> Result {
		debug!("interrupting services");
		for service in &self.services {
			service.interrupt().await;
		}

		let mut workers = self.workers.lock().await;
		while let Some(outcome) = workers.join_next().await {
			match outcome {
				| Ok((name, Ok(()))) => debug!(service = %name, "worker stopped"),
				| Ok((name, Err(e))) => error!(service = %name, error = %e, "worker stopped with error"),
				| Err(e) => error!(error = %e, "worker task panicked"),
			}
		}

		info!("all workers stopped");
		Ok(())
	}
}
