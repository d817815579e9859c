use std::time::Duration;

use vellum_primitives::Position;
use vellum_worker::QueueError;

/// A convenient type alias for `Result` with `E` = [`enum@crate::Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Possible session errors.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// `start` was called on a process that is already running.
	#[error("prover process is already running")]
	AlreadyRunning,
	/// The operation needs a running prover process.
	#[error("prover process is not running")]
	NotRunning,
	/// The prover executable could not be spawned.
	#[error("failed to spawn prover `{program}`: {reason}")]
	Spawn {
		/// Executable that failed to spawn.
		program: String,
		/// Reason for the failure.
		reason: String,
	},
	/// The prover exited before printing anything.
	#[error("prover exited before becoming ready")]
	ExitedBeforeReady,
	/// The prover printed nothing within the startup timeout.
	#[error("prover did not become ready within {}ms", .0.as_millis())]
	StartupTimeout(Duration),
	/// A command failed on the channel.
	#[error(transparent)]
	Rpc(#[from] vellum_rpc::Error),
	/// The operation queue rejected the operation without running it to completion.
	#[error("{0}")]
	Queue(String),
	/// A record would have broken document order in the history.
	#[error("command at {start} precedes the evaluated range ending at {evaluated_end}")]
	OutOfOrder {
		/// Start of the rejected record.
		start: Position,
		/// End of the evaluated range at the time.
		evaluated_end: Position,
	},
	/// The configuration could not be read or parsed.
	#[error("invalid configuration: {0}")]
	Config(String),
}

impl Error {
	/// Returns true if the queue was cleared under the operation.
	///
	/// The outcome of such an operation is unknown; it is not a prover error.
	pub fn is_cleared(&self) -> bool {
		matches!(self, Self::Queue(_))
	}
}

impl From<QueueError<Error>> for Error {
	fn from(err: QueueError<Error>) -> Self {
		match err {
			QueueError::Failed(err) => err,
			err @ (QueueError::Cleared | QueueError::Closed) => Self::Queue(err.to_string()),
		}
	}
}
