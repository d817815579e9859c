use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use vellum_primitives::Position;
use vellum_session::{Dialect, SessionConfig};

#[derive(Parser, Debug)]
#[command(name = "vellum")]
#[command(about = "Check a proof script against a live Adelfa or Abella session")]
#[command(version)]
/// Command-line arguments.
pub struct Cli {
	/// Proof script to load
	pub file: PathBuf,

	/// Session configuration file (TOML)
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Prover dialect, overriding the configuration file
	#[arg(long, value_enum)]
	pub prover: Option<Prover>,

	/// Prover executable, overriding the configuration file
	#[arg(long, value_name = "EXE")]
	pub path: Option<String>,

	/// Evaluate up to this 1-based LINE:COL instead of the end of the file
	#[arg(long, value_name = "LINE:COL", value_parser = parse_cursor)]
	pub cursor: Option<Position>,

	/// Print the status of every evaluated line
	#[arg(long)]
	pub status: bool,

	/// Verbose logging
	#[arg(long, short)]
	pub verbose: bool,
}

/// Supported provers.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prover {
	Adelfa,
	Abella,
}

impl From<Prover> for Dialect {
	fn from(prover: Prover) -> Self {
		match prover {
			Prover::Adelfa => Dialect::Adelfa,
			Prover::Abella => Dialect::Abella,
		}
	}
}

impl Cli {
	/// Configuration file (if any) with command-line overrides applied.
	pub fn session_config(&self) -> anyhow::Result<SessionConfig> {
		let mut config = match &self.config {
			Some(path) => SessionConfig::load(path)?,
			None => SessionConfig::default(),
		};
		if let Some(prover) = self.prover {
			config.prover = prover.into();
		}
		if let Some(path) = &self.path {
			config = config.path(path.clone());
		}
		Ok(config)
	}
}

/// Parses a 1-based `LINE:COL` into a document position.
pub fn parse_cursor(raw: &str) -> Result<Position, String> {
	let (line, col) = raw.split_once(':').ok_or_else(|| format!("expected LINE:COL, got `{raw}`"))?;
	let parse = |part: &str, what: &str| -> Result<u32, String> {
		match part.trim().parse::<u32>() {
			Ok(0) | Err(_) => Err(format!("{what} must be a positive integer, got `{part}`")),
			Ok(n) => Ok(n - 1),
		}
	};
	Ok(Position::new(parse(line, "line")?, parse(col, "column")?))
}
