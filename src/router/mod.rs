//! Wires `echotimer_api`'s router onto `echotimer_service`'s `Services` and
//! serves it.

mod layers;
mod run;
mod serve;

pub use run::{start, stop};
