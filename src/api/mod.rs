//! The HTTP/WebSocket surface, a thin wrapper over `echotimer_service`'s
//! `TimerCore` (component C). The router assembles handlers, handlers stay
//! thin, and the service layer holds all the logic.

mod error;
pub mod router;
mod ws;

pub use router::build;
