//! `vellum`: loads a proof script into a prover session and reports the
//! output at the cursor.

mod cli;
mod output;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use cli::Cli;
use output::StdoutSink;
use tracing::info;
use vellum_primitives::{DocumentAccessor, Rope, Selection};
use vellum_session::{Session, Sinks};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();
	setup_tracing(cli.verbose);

	let config = cli.session_config()?;
	let text = std::fs::read_to_string(&cli.file).with_context(|| format!("failed to read {}", cli.file.display()))?;
	let text = Rope::from(text);
	let cursor = cli.cursor.unwrap_or_else(|| text.end_position());
	info!(file = %cli.file.display(), %cursor, prover = %config.prover, "loading proof script");

	let sink = Arc::new(StdoutSink::default());
	let program = config.program().to_owned();
	let session = Session::start(config, &cli.file, text, Selection::point(cursor), Sinks::new(sink.clone(), sink.clone()))
		.await
		.with_context(|| format!("failed to start {program}"))?;
	if !session.config().auto_display {
		session.show_output()?;
	}

	if cli.status {
		sink.write_status(&mut std::io::stdout().lock())?;
	}

	session.shutdown().await;
	Ok(())
}

fn setup_tracing(verbose: bool) {
	use std::fs::OpenOptions;

	use tracing_subscriber::EnvFilter;
	use tracing_subscriber::prelude::*;

	let filter = || {
		EnvFilter::try_from_env("VELLUM_LOG")
			.or_else(|_| EnvFilter::try_from_default_env())
			.unwrap_or_else(|_| {
				if verbose {
					EnvFilter::new("vellum=debug,vellum_session=debug,vellum_rpc=debug,info")
				} else {
					EnvFilter::new("warn")
				}
			})
	};

	// VELLUM_LOG_DIR redirects logs to a per-process file.
	if let Some(log_dir) = std::env::var("VELLUM_LOG_DIR").ok().map(PathBuf::from)
		&& std::fs::create_dir_all(&log_dir).is_ok()
	{
		let log_path = log_dir.join(format!("vellum.{}.log", std::process::id()));
		if let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_path) {
			let file_layer = tracing_subscriber::fmt::layer()
				.with_writer(file)
				.with_ansi(false)
				.with_target(true);
			tracing_subscriber::registry().with(filter()).with(file_layer).init();
			tracing::info!(path = ?log_path, "tracing initialized");
			return;
		}
	}

	tracing_subscriber::fmt()
		.with_env_filter(filter())
		.with_writer(std::io::stderr)
		.init();
}
