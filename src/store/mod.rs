//! The engine-access layer: a thin, typed wrapper around the two external
//! collaborators named in the design (the presence/coordination store,
//! backed by Redis, and the primary persistence store, PostgreSQL via
//! `sqlx`). Domain services in `echotimer_service` hold one of these and
//! layer key-naming/semantics on top.

pub mod migrations;
pub mod postgres;
pub mod redis;

pub use postgres::PgStore;
pub use redis::RedisStore;
