use std::io;
use std::time::Duration;

/// A convenient type alias for `Result` with `E` = [`enum@crate::Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Possible channel errors.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// A command was sent while another one was still outstanding.
	#[error("a command is already outstanding on this channel")]
	Busy,
	/// The prover reported a failure for the command.
	#[error("{0}")]
	Rejected(String),
	/// No reply terminator arrived in time.
	#[error("command timed out after {}ms", .0.as_millis())]
	Timeout(Duration),
	/// The prover's output stream reached EOF.
	#[error("prover output closed")]
	Closed,
	/// Input/output errors from the underlying pipes.
	#[error("{0}")]
	Io(#[from] io::Error),
}

impl Error {
	/// Returns true for failures reported by the prover itself.
	pub fn is_rejection(&self) -> bool {
		matches!(self, Self::Rejected(_))
	}
}
