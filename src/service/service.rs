//! The `Service` trait every component (A-E) implements, and the `Args`
//! bundle threaded into each `Service::build`.

use std::sync::Arc;

use async_trait::async_trait;
use echotimer_core::{Result, Server};
use echotimer_store::{PgStore, RedisStore};

use crate::{channels::Channels, presence, sessions::Sessions};

/// Everything a component needs to construct itself. Cross-component
/// coordination that *would* need a cyclic direct reference (the
/// scheduler/dispatcher cycle) goes through `channels` instead. The
/// legitimate one-directional dependencies (TimerCore and the Fleet Event
/// Bus consumer both read the Presence Index and push through the shared
/// local session registry) are threaded through explicitly as
/// `presence`/`sessions` since neither is a cycle, and a shared instance
/// avoids every component re-reading that state independently.
pub struct Args<'a> {
	pub server: &'a Arc<Server>,
	pub redis: &'a RedisStore,
	pub pg: &'a PgStore,
	pub channels: &'a Channels,
	pub presence: &'a Arc<presence::Service>,
	pub sessions: &'a Arc<Sessions>,
}

#[async_trait]
pub trait Service: Send + Sync {
	fn build(args: &Args<'_>) -> Result<Arc<Self>>
	where
		Self: Sized;

	/// The component's long-running loop, if it has one. Components with
	/// no background work (the Presence Index, the in-process session
	/// registry) use the default, which simply waits for shutdown.
	async fn worker(self: Arc<Self>) -> Result { Ok(()) }

	/// Cooperative shutdown signal: the `Server::until_shutdown` pattern run
	/// through every component together.
	async fn interrupt(&self) {}

	fn name(&self) -> &str;
}
