//! Request/reply plumbing for interactive prover subprocesses.
//!
//! Provers speak a line-oriented REPL protocol: a command is written to stdin,
//! the reply is whatever appears on stdout up to the next prompt, and anything
//! on stderr means the command failed. This crate provides:
//! * [`Protocol`]: how a dialect encodes commands and frames replies.
//! * [`Dialect`]: the built-in Adelfa and Abella dialects.
//! * [`Channel`]: one-request-at-a-time channel with long-lived stream readers.
//! * [`ProverTransport`]: the seam the session engine sends commands through.

#![warn(missing_docs)]

mod channel;
mod error;
pub mod protocol;
mod transport;

pub use channel::{Channel, DEFAULT_COMMAND_TIMEOUT};
pub use error::{Error, Result};
pub use protocol::{Dialect, Frame, Protocol};
pub use transport::ProverTransport;
