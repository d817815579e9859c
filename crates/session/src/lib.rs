//! Keeps a live proof-assistant session in step with an edited document.
//!
//! As the document changes and the cursor moves, top-level commands are sent
//! to the prover incrementally. Commands it already accepted are never sent
//! again, and commands invalidated by an edit are undone newest first.
//!
//! * [`tokenizer`]: splits text into top-level commands.
//! * [`SessionState`]: the accepted history, the current error, derived views.
//! * [`SessionProcess`]: spawns the prover and hands out the channel to it.
//! * [`CommandExecutor`]: execute and undo operations through one queue.
//! * [`SyncDriver`]: reacts to edits and cursor moves.
//! * [`Session`]: wires all of the above for one document.

mod config;
mod driver;
mod error;
mod executor;
mod process;
mod session;
mod sink;
mod state;
#[cfg(test)]
mod testing;
pub mod tokenizer;

pub use config::SessionConfig;
pub use driver::{DriverStatus, EditorSnapshot, PassOutcome, SyncDriver};
pub use error::{Error, Result};
pub use executor::CommandExecutor;
pub use process::{ProcessState, SessionProcess};
pub use session::Session;
pub use sink::{DecorationSink, InfoUpdate, NullSink, PresentationSink, Sinks};
pub use state::{CommandRecord, ErrorInfo, LineStatus, SessionState};
pub use tokenizer::{Command, tokenize, tokenize_to};
pub use vellum_rpc::Dialect;
