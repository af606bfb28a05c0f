//! The five cooperating components (A-E), plus the ambient `Service`
//! lifecycle contract that wires them together: every component is
//! `fn build(&Args) -> Result<Arc<Self>>`, an optional
//! `async fn worker(Arc<Self>) -> Result` long-running loop, and a
//! cooperative `async fn interrupt(&self)`.

mod manager;
mod service;

pub mod bus;
pub mod channels;
pub mod dispatcher;
pub mod events;
pub mod monitor;
pub mod presence;
pub mod scheduler;
pub mod services;
pub mod sessions;

pub use self::{
	service::{Args, Service},
	services::Services,
};

/// Derives a short name from a module path, e.g.
/// `echotimer_service::presence` → `presence`.
#[must_use]
pub(crate) fn make_name(module_path: &str) -> &str {
	module_path.rsplit("::").next().unwrap_or(module_path)
}
