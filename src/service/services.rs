//! Builds every component (the five cooperating A-E services) and drives
//! them through the `Manager`.

use std::sync::Arc;

use echotimer_core::{Result, Server};
use echotimer_store::{PgStore, RedisStore};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{
	Args, Service as _,
	bus, channels::Channels, dispatcher, manager::Manager, monitor, presence,
	scheduler, sessions::Sessions,
};

pub struct Services {
	pub presence: Arc<presence::Service>,
	pub scheduler: Arc<scheduler::Service>,
	pub dispatcher: Arc<dispatcher::Service>,
	pub bus: Arc<bus::Service>,
	pub monitor: Arc<monitor::Service>,

	pub sessions: Arc<Sessions>,
	pub redis: RedisStore,
	pub pg: PgStore,
	pub server: Arc<Server>,

	manager: Mutex<Option<Arc<Manager>>>,
}

impl Services {
	pub async fn build(server: Arc<Server>) -> Result<Arc<Self>> {
		let redis = RedisStore::connect(&server.config.presence_store_url)?;
		let pg = PgStore::connect(&server.config.database_url).await?;
		echotimer_store::migrations::run(&pg).await?;

		let channels = Channels::new();
		let sessions = Sessions::new();
		// Bootstrapped directly: every other component's `Args` carries a
		// shared `Arc<presence::Service>`, which would make the usual
		// `Service::build(&Args)` path circular for presence itself.
		let presence = presence::new(redis.clone(), server.config.presence_ttls.clone());

		let args = Args {
			server: &server,
			redis: &redis,
			pg: &pg,
			channels: &channels,
			presence: &presence,
			sessions: &sessions,
		};

		let scheduler = scheduler::Service::build(&args)?;
		let dispatcher = dispatcher::Service::build(&args)?;
		let bus = bus::Service::build(&args)?;
		let monitor = monitor::Service::build(&args)?;

		Ok(Arc::new(Self {
			presence,
			scheduler,
			dispatcher,
			bus,
			monitor,
			sessions,
			redis,
			pg,
			server,
			manager: Mutex::new(None),
		}))
	}

	fn services(&self) -> Vec<Arc<dyn Service>> {
		vec![
			Arc::clone(&self.scheduler) as Arc<dyn Service>,
			Arc::clone(&self.dispatcher) as Arc<dyn Service>,
			Arc::clone(&self.bus) as Arc<dyn Service>,
			Arc::clone(&self.monitor) as Arc<dyn Service>,
		]
	}

	pub async fn start(self: &Arc<Self>) -> Result<Arc<Self>> {
		debug!("starting services");
		let manager = Manager::new(&self.server, self.services());
		manager.start().await?;
		tokio::spawn(Arc::clone(&manager).watch());
		*self.manager.lock().await = Some(manager);
		info!("services started");
		Ok(Arc::clone(self))
	}

	pub async fn stop(&self) {
		info!("stopping services");
		if let Some(manager) = self.manager.lock().await.as_ref() {
			_ = manager.stop().await;
		}
	}
}
