//! Process lifecycle: parse args, load config, build the `Server` handle and
//! `Services`, run the router, shut down cleanly on signal, via an
//! `exec`/`start`/`run`/`stop` split. No hot-reload, jemalloc, or sentry
//! machinery; none of that is needed here.

pub mod args;

use std::sync::Arc;

use echotimer_core::{Config, Result, Server};
use tracing::{debug, info};

pub use self::args::Args;

pub async fn exec(args: &Args) -> Result {
	let config = Config::load(args.config.as_ref())?;
	echotimer_core::log::init(&config.log);

	let server = Server::new(config);
	info!(instance_id = %server.config.instance_id, "starting");

	let (services, listener) = echotimer_router::start(&server).await?;
	run(&server).await;
	echotimer_router::stop(services, listener).await;

	debug!("exit");
	Ok(())
}

async fn run(server: &Arc<Server>) {
	tokio::select! {
		() = server.until_shutdown() => {},
		_ = tokio::signal::ctrl_c() => {
			info!("ctrl-c received");
			server.shutdown();
		},
	}
}
