//! Binds the listen address and serves the assembled router with graceful
//! shutdown tied to [`echotimer_core::Server::until_shutdown`]. No
//! TLS/unix-socket branches; this service has no use for them.

use std::sync::Arc;

use axum::Router;
use echotimer_core::{Error, Result, Server};
use tracing::info;

pub async fn serve(server: Arc<Server>, router: Router) -> Result {
	let addr = server.config.listen;
	let listener = tokio::net::TcpListener::bind(addr)
		.await
		.map_err(|e| Error::Internal(format!("failed to bind {addr}: {e}")))?;

	info!(%addr, "listening");

	axum::serve(listener, router.into_make_service())
		.with_graceful_shutdown(shutdown_signal(server))
		.await
		.map_err(|e| Error::Internal(e.to_string()))
}

async fn shutdown_signal(server: Arc<Server>) { server.until_shutdown().await; }
