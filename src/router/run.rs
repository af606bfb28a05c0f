//! Ties `echotimer_service::Services` (component lifecycle) to the HTTP
//! listener via a `start`/`run`/`stop` split. No admin-console,
//! systemd-notify, or hot-reload pieces; none of that is needed here.

use std::sync::Arc;

use echotimer_core::{Result, Server};
use echotimer_service::Services;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::{layers, serve};

/// Builds `Services`, starts every component's worker loop, and spawns the
/// HTTP/WS listener in the background. The returned handle resolves once
/// the listener itself has stopped (after `server.shutdown()` fires and
/// in-flight requests drain).
pub async fn start(server: &Arc<Server>) -> Result<(Arc<Services>, JoinHandle<()>)> {
	debug!("starting");
	let services = Services::build(Arc::clone(server)).await?.start().await?;

	let router = layers::wrap(echotimer_api::build(Arc::clone(&services)));
	let listener_server = Arc::clone(server);
	let handle = tokio::spawn(async move {
		if let Err(e) = serve::serve(listener_server, router).await {
			error!(error = %e, "http listener exited with error");
		}
	});

	Ok((services, handle))
}

pub async fn stop(services: Arc<Services>, listener: JoinHandle<()>) {
	debug!("stopping");
	services.stop().await;
	_ = listener.await;
}
