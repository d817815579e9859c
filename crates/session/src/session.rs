//! One prover session bound to one document.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};
use ropey::Rope;
use tracing::info;
use vellum_primitives::Selection;
use vellum_rpc::ProverTransport;

use crate::config::SessionConfig;
use crate::driver::{PassOutcome, SyncDriver};
use crate::executor::CommandExecutor;
use crate::process::SessionProcess;
use crate::sink::{InfoUpdate, Sinks};
use crate::state::SessionState;
use crate::{Error, Result};

/// A live prover session and the state synchronized with it.
///
/// Owns the subprocess, the session state and the driver. Nothing survives a
/// [`Session::restart`]; history and errors are rebuilt from the document.
#[derive(Debug)]
pub struct Session {
	config: SessionConfig,
	document: PathBuf,
	sinks: Sinks,
	state: Arc<RwLock<SessionState>>,
	process: SessionProcess,
	driver: SyncDriver,
}

impl Session {
	/// Starts the prover next to `document` and evaluates up to the cursor.
	///
	/// Fails if the prover does not start; no process is left running then.
	pub async fn start(config: SessionConfig, document: impl Into<PathBuf>, text: Rope, selection: Selection, sinks: Sinks) -> Result<Self> {
		let document = document.into();
		if config.auto_display {
			sinks.presentation.open();
			sinks.presentation.update(InfoUpdate::message(InfoUpdate::LOADING));
		}

		let state = Arc::new(RwLock::new(SessionState::new()));
		state.write().set_file_path(Some(document.clone()));

		let process = SessionProcess::new(&config);
		let cwd = working_dir(&document);
		info!(program = config.program(), prover = %config.prover, document = %document.display(), "starting session");
		let channel = process.start(&cwd).await?;

		let transport: Arc<dyn ProverTransport> = channel;
		let executor = CommandExecutor::new(Arc::clone(&state), transport, config.prover);
		let driver = SyncDriver::new(executor, Arc::clone(&state), sinks.clone(), &config);

		let session = Self {
			config,
			document,
			sinks,
			state,
			process,
			driver,
		};
		let outcome = session.driver.load(text, selection).await;
		info!(?outcome, "initial load finished");
		Ok(session)
	}

	/// Shuts down and starts over with the same configuration and document.
	pub async fn restart(self, text: Rope, selection: Selection) -> Result<Self> {
		self.shutdown().await;
		let Self { config, document, sinks, .. } = self;
		Self::start(config, document, text, selection, sinks).await
	}

	/// Cancels debounced passes, clears the operation queue, stops the prover
	/// and forgets all state.
	pub async fn shutdown(&self) {
		self.driver.shut_down();
		self.driver.executor().clear();
		self.process.stop().await;
		self.state.write().reset();
		info!(document = %self.document.display(), "session shut down");
	}

	/// Opens the output presentation.
	pub fn show_output(&self) -> Result<()> {
		if !self.process.is_running() {
			return Err(Error::NotRunning);
		}
		self.driver.open_presentation();
		Ok(())
	}

	/// Synchronizes up to the current cursor without waiting for a debounce.
	pub async fn sync(&self) -> PassOutcome {
		self.driver.sync_to_cursor().await
	}

	pub fn driver(&self) -> &SyncDriver {
		&self.driver
	}

	pub fn process(&self) -> &SessionProcess {
		&self.process
	}

	pub fn state(&self) -> RwLockReadGuard<'_, SessionState> {
		self.state.read()
	}

	pub fn config(&self) -> &SessionConfig {
		&self.config
	}

	pub fn document(&self) -> &Path {
		&self.document
	}
}

fn working_dir(document: &Path) -> PathBuf {
	match document.parent() {
		Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
		_ => PathBuf::from("."),
	}
}

#[cfg(all(test, unix))]
mod tests {
	use vellum_primitives::{DocumentAccessor, Position};

	use super::*;
	use crate::testing::RecordingSink;

	fn echo_prover() -> SessionConfig {
		SessionConfig::default()
			.path("sh")
			.args(["-c", "printf 'Welcome\\n>> '; exec cat"])
			.command_timeout_ms(100)
	}

	#[tokio::test]
	async fn start_show_output_and_shutdown() {
		let dir = tempfile::tempdir().unwrap();
		let sink = Arc::new(RecordingSink::default());
		let config = echo_prover().auto_display(false);

		let session = Session::start(config, dir.path().join("empty.lf"), Rope::new(), Selection::default(), sink.sinks())
			.await
			.unwrap();
		assert!(session.process().is_running());
		assert!(sink.infos.lock().is_empty());
		assert_eq!(session.state().file_path(), Some(&dir.path().join("empty.lf")));

		session.show_output().unwrap();
		assert_eq!(sink.last_info(), Some(InfoUpdate::message(InfoUpdate::NO_COMMAND)));

		session.shutdown().await;
		assert!(matches!(session.show_output(), Err(Error::NotRunning)));
		assert!(session.state().file_path().is_none());

		let published = sink.decorations.lock().len();
		assert_eq!(session.sync().await, PassOutcome::Cancelled);
		assert_eq!(sink.decorations.lock().len(), published);
	}

	#[tokio::test]
	async fn loading_message_precedes_first_output() {
		let dir = tempfile::tempdir().unwrap();
		let sink = Arc::new(RecordingSink::default());

		let session = Session::start(echo_prover(), dir.path().join("a.lf"), Rope::new(), Selection::default(), sink.sinks())
			.await
			.unwrap();

		let infos = sink.infos.lock().clone();
		assert_eq!(infos.first(), Some(&InfoUpdate::message(InfoUpdate::LOADING)));
		assert_eq!(infos.last(), Some(&InfoUpdate::message(InfoUpdate::NO_COMMAND)));
		session.shutdown().await;
	}

	#[tokio::test]
	async fn unanswered_command_times_out_into_error() {
		let dir = tempfile::tempdir().unwrap();
		let text = "nat : type.";

		let session = Session::start(
			echo_prover(),
			dir.path().join("nat.lf"),
			Rope::from(text),
			Selection::point(text.end_position()),
			Sinks::default(),
		)
		.await
		.unwrap();

		{
			let state = session.state();
			assert!(state.history().is_empty());
			let error = state.error_info().unwrap();
			assert_eq!(error.command, "nat : type.");
			assert!(error.message.contains("timed out"), "{}", error.message);
		}
		assert!(session.process().is_running());

		let session = session.restart(Rope::new(), Selection::point(Position::ZERO)).await.unwrap();
		assert!(session.state().error_info().is_none());
		assert!(session.process().is_running());
		session.shutdown().await;
	}

	#[tokio::test]
	async fn failed_start_reports_spawn_error() {
		let dir = tempfile::tempdir().unwrap();
		let config = SessionConfig::default().path("/nonexistent/adelfa").startup_timeout_ms(500);

		let err = Session::start(config, dir.path().join("x.lf"), Rope::new(), Selection::default(), Sinks::default())
			.await
			.unwrap_err();
		assert!(matches!(err, Error::Spawn { .. }));
	}

	#[test]
	fn bare_file_name_runs_in_current_dir() {
		assert_eq!(working_dir(Path::new("nat.lf")), PathBuf::from("."));
		assert_eq!(working_dir(Path::new("/proofs/nat.lf")), PathBuf::from("/proofs"));
	}
}
