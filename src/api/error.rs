//! `IntoResponse` for `echotimer_core::Error`, mapping the core error
//! categories onto HTTP status codes.

use axum::{Json, http::StatusCode, response::{IntoResponse, Response}};
use echotimer_core::Error;
use serde::Serialize;

#[derive(Serialize)]
struct ErrorBody {
	error: &'static str,
	message: String,
}

/// Newtype so `echotimer_core::Error` (defined in a crate with no `axum`
/// dependency) can still be returned directly from a handler.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
	fn from(e: Error) -> Self { Self(e) }
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let (status, error) = match &self.0 {
			| Error::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
			| Error::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
			| Error::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
			| Error::Invalid(_) => (StatusCode::BAD_REQUEST, "INVALID"),
			| Error::StoreUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE"),
			| Error::BusUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "BUS_UNAVAILABLE"),
			| Error::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
			| Error::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
			| Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
		};

		let body = ErrorBody { error, message: self.0.to_string() };
		(status, Json(body)).into_response()
	}
}
