//! Plain versioned SQL files applied at startup: ordered steps run against
//! the configured backend before `Services::start` unblocks.

use echotimer_core::Result;

use crate::postgres::PgStore;

/// Run every migration in `migrations/` that hasn't already been applied,
/// tracked in `sqlx`'s own `_sqlx_migrations` table.
pub async fn run(store: &PgStore) -> Result {
	sqlx::migrate!("./migrations")
		.run(store.pool())
		.await
		.map_err(|e| echotimer_core::Error::Database(sqlx::Error::Migrate(Box::new(e))))?;

	Ok(())
}
