//! `clap` integration: a handful of process-level overrides layered on top
//! of [`echotimer_core::Config::load`]'s figment chain, feeding parsed
//! flags back into config resolution.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[clap(about, long_about = None, name = "echotimer", version = echotimer_core::version())]
pub struct Args {
	/// Path to the config TOML file (optional; defaults + env vars apply
	/// regardless).
	#[arg(short, long)]
	pub config: Option<PathBuf>,
}

#[must_use]
pub fn parse() -> Args { Args::parse() }
