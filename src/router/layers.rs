//! Ambient HTTP middleware: request tracing and permissive CORS, wrapped
//! around the assembled `axum::Router` before it's served. No
//! compression/sentry layers; those are out of scope.

use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[must_use]
pub fn wrap(router: Router) -> Router {
	router
		.layer(TraceLayer::new_for_http())
		.layer(CorsLayer::permissive())
}
