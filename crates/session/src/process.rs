//! Prover subprocess lifecycle.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use vellum_rpc::{Channel, Dialect};

use crate::config::SessionConfig;
use crate::{Error, Result};

/// Lifecycle state of the prover subprocess.
///
/// Moves forward only, except that `Stopped` may go back to `Starting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
	NotStarted,
	Starting,
	Ready,
	Stopped,
}

struct Running {
	child: Child,
	channel: Arc<Channel>,
}

/// Owns at most one live prover subprocess and the channel to it.
pub struct SessionProcess {
	program: String,
	args: Vec<String>,
	dialect: Dialect,
	startup_timeout: Duration,
	command_timeout: Option<Duration>,
	running: Mutex<Option<Running>>,
	state: watch::Sender<ProcessState>,
}

impl std::fmt::Debug for SessionProcess {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SessionProcess")
			.field("program", &self.program)
			.field("dialect", &self.dialect)
			.field("state", &self.state())
			.finish_non_exhaustive()
	}
}

impl SessionProcess {
	pub fn new(config: &SessionConfig) -> Self {
		Self {
			program: config.program().to_owned(),
			args: config.args.clone(),
			dialect: config.prover,
			startup_timeout: config.startup_timeout(),
			command_timeout: config.command_timeout(),
			running: Mutex::new(None),
			state: watch::Sender::new(ProcessState::NotStarted),
		}
	}

	pub fn state(&self) -> ProcessState {
		*self.state.borrow()
	}

	/// Receiver notified on every lifecycle transition.
	pub fn subscribe(&self) -> watch::Receiver<ProcessState> {
		self.state.subscribe()
	}

	/// Returns true while the subprocess is ready and its output is open.
	pub fn is_running(&self) -> bool {
		self.running.lock().as_ref().is_some_and(|running| !running.channel.is_closed())
	}

	/// The channel to the running subprocess.
	pub fn channel(&self) -> Option<Arc<Channel>> {
		self.running.lock().as_ref().map(|running| Arc::clone(&running.channel))
	}

	/// Spawns the prover in `cwd` and waits until it prints its first output.
	///
	/// The first chunk is the prover's banner and prompt; it is consumed here so
	/// the channel starts with an empty buffer. Fails if the prover cannot be
	/// spawned, exits first, or stays silent past the startup timeout. No
	/// process is left running on failure.
	pub async fn start(&self, cwd: &Path) -> Result<Arc<Channel>> {
		let mut starting = false;
		self.state.send_if_modified(|state| match *state {
			ProcessState::Starting | ProcessState::Ready => false,
			ProcessState::NotStarted | ProcessState::Stopped => {
				*state = ProcessState::Starting;
				starting = true;
				true
			}
		});
		if !starting {
			return Err(Error::AlreadyRunning);
		}

		match self.spawn_ready(cwd).await {
			Ok(running) => {
				let channel = Arc::clone(&running.channel);
				*self.running.lock() = Some(running);
				self.state.send_replace(ProcessState::Ready);
				Ok(channel)
			}
			Err(err) => {
				warn!(program = %self.program, error = %err, "prover failed to start");
				self.state.send_replace(ProcessState::Stopped);
				Err(err)
			}
		}
	}

	async fn spawn_ready(&self, cwd: &Path) -> Result<Running> {
		let spawn_error = |reason: String| Error::Spawn {
			program: self.program.clone(),
			reason,
		};

		let mut cmd = Command::new(&self.program);
		cmd.args(&self.args)
			.current_dir(cwd)
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true);

		let mut child = cmd.spawn().map_err(|e| spawn_error(e.to_string()))?;
		let (Some(stdin), Some(mut stdout), Some(stderr)) = (child.stdin.take(), child.stdout.take(), child.stderr.take())
		else {
			return Err(spawn_error("stdio not piped".into()));
		};

		let mut banner = vec![0u8; 4096];
		let ready = tokio::time::timeout(self.startup_timeout, async {
			tokio::select! {
				biased;
				read = stdout.read(&mut banner) => match read {
					Ok(0) | Err(_) => Err(Error::ExitedBeforeReady),
					Ok(n) => Ok(n),
				},
				_ = child.wait() => Err(Error::ExitedBeforeReady),
			}
		})
		.await
		.unwrap_or(Err(Error::StartupTimeout(self.startup_timeout)));

		let n = match ready {
			Ok(n) => n,
			Err(err) => {
				let _ = child.kill().await;
				return Err(err);
			}
		};
		debug!(
			program = %self.program,
			pid = child.id(),
			banner = %String::from_utf8_lossy(&banner[..n]).trim(),
			"prover ready"
		);

		let channel = Arc::new(Channel::new(self.dialect, stdin, stdout, stderr, self.command_timeout));
		Ok(Running { child, channel })
	}

	/// Terminates the subprocess and waits for it to exit.
	///
	/// Does nothing if no process is running.
	pub async fn stop(&self) {
		let Some(Running { mut child, channel }) = self.running.lock().take() else {
			return;
		};
		drop(channel);

		info!(program = %self.program, pid = child.id(), "ending prover process");
		if let Err(err) = child.start_kill() {
			debug!(error = %err, "prover already exited");
		}
		match child.wait().await {
			Ok(status) => debug!(%status, "prover exited"),
			Err(err) => warn!(error = %err, "failed to wait for prover exit"),
		}
		self.state.send_replace(ProcessState::Stopped);
	}
}

#[cfg(all(test, unix))]
mod tests {
	use super::*;

	fn sh(script: &str) -> SessionConfig {
		SessionConfig::default().path("sh").args(["-c", script]).startup_timeout_ms(2_000)
	}

	#[tokio::test]
	async fn start_waits_for_banner_and_stop_is_idempotent() {
		let dir = tempfile::tempdir().unwrap();
		let process = SessionProcess::new(&sh("printf 'Welcome\\n>> '; exec cat"));
		assert_eq!(process.state(), ProcessState::NotStarted);

		process.start(dir.path()).await.unwrap();
		assert_eq!(process.state(), ProcessState::Ready);
		assert!(process.is_running());
		assert!(process.channel().is_some());
		assert!(matches!(process.start(dir.path()).await, Err(Error::AlreadyRunning)));

		process.stop().await;
		assert_eq!(process.state(), ProcessState::Stopped);
		assert!(!process.is_running());
		assert!(process.channel().is_none());
		process.stop().await;

		process.start(dir.path()).await.unwrap();
		assert!(process.is_running());
		process.stop().await;
	}

	#[tokio::test]
	async fn exit_before_output_fails_start() {
		let dir = tempfile::tempdir().unwrap();
		let process = SessionProcess::new(&sh("exit 3"));

		assert!(matches!(process.start(dir.path()).await, Err(Error::ExitedBeforeReady)));
		assert_eq!(process.state(), ProcessState::Stopped);
		assert!(!process.is_running());
	}

	#[tokio::test]
	async fn silent_prover_times_out() {
		let dir = tempfile::tempdir().unwrap();
		let process = SessionProcess::new(&sh("exec sleep 10").startup_timeout_ms(50));

		let err = process.start(dir.path()).await.unwrap_err();
		assert!(matches!(err, Error::StartupTimeout(limit) if limit == Duration::from_millis(50)));
		assert!(!process.is_running());
	}

	#[tokio::test]
	async fn missing_executable_is_a_spawn_error() {
		let dir = tempfile::tempdir().unwrap();
		let process = SessionProcess::new(&SessionConfig::default().path("/nonexistent/vellum-prover"));

		let err = process.start(dir.path()).await.unwrap_err();
		assert!(matches!(err, Error::Spawn { ref program, .. } if program == "/nonexistent/vellum-prover"));
	}
}
