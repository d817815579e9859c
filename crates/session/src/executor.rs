//! Execute and undo operations against the prover.
//!
//! Every interaction that changes prover state goes through one
//! [`OperationQueue`], so an execute batch and an undo never interleave their
//! sends.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};
use vellum_primitives::Position;
use vellum_rpc::{Dialect, Protocol, ProverTransport};
use vellum_worker::OperationQueue;

use crate::state::{CommandRecord, ErrorInfo, SessionState};
use crate::tokenizer::Command;
use crate::{Error, Result};


/// Runs execute and undo operations one at a time, recording their effect in
/// the session state.
pub struct CommandExecutor {
	queue: OperationQueue<(), Error>,
	state: Arc<RwLock<SessionState>>,
	transport: Arc<dyn ProverTransport>,
	dialect: Dialect,
}

impl std::fmt::Debug for CommandExecutor {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CommandExecutor")
			.field("queue", &self.queue)
			.field("dialect", &self.dialect)
			.finish_non_exhaustive()
	}
}

impl CommandExecutor {
	pub fn new(state: Arc<RwLock<SessionState>>, transport: Arc<dyn ProverTransport>, dialect: Dialect) -> Self {
		Self {
			queue: OperationQueue::new("commands"),
			state,
			transport,
			dialect,
		}
	}

	/// Sends `commands` in order, appending each accepted one to the history.
	///
	/// The first rejected command is recorded as the session error and ends the
	/// batch; later commands are never sent.
	pub async fn execute(&self, commands: Vec<Command>) -> Result<()> {
		let state = Arc::clone(&self.state);
		let transport = Arc::clone(&self.transport);
		self.queue
			.enqueue("execute", async move {
				for command in commands {
					execute_one(&state, transport.as_ref(), command).await?;
				}
				Ok(())
			})
			.await
			.map_err(Error::from)
	}

	/// Undoes, newest first, every record ending at or after `pos`.
	pub async fn undo_to(&self, pos: Position) -> Result<()> {
		let state = Arc::clone(&self.state);
		let transport = Arc::clone(&self.transport);
		let dialect = self.dialect;
		self.queue
			.enqueue("undo", async move {
				let count = state.read().commands_touching_position(pos).count();
				for _ in 0..count {
					undo_last(&state, transport.as_ref(), dialect).await?;
				}
				Ok(())
			})
			.await
			.map_err(Error::from)
	}

	/// Rejects every queued and in-flight operation.
	pub fn clear(&self) {
		self.queue.clear();
	}

	pub fn is_processing(&self) -> bool {
		self.queue.is_processing()
	}

	pub fn queue_size(&self) -> usize {
		self.queue.size()
	}
}

async fn execute_one(state: &RwLock<SessionState>, transport: &dyn ProverTransport, command: Command) -> Result<()> {
	{
		let mut state = state.write();
		state.check_order(command.span)?;
		state.add_pending(&command.text);
	}

	debug!(command = %command.text, span = %command.span, "execute");
	match transport.send(&command.text).await {
		Ok(output) => state.write().add_command(CommandRecord::accepted(command, output)),
		Err(err) => {
			warn!(command = %command.text, span = %command.span, error = %err, "prover rejected command");
			let mut state = state.write();
			state.remove_pending(&command.text);
			state.set_error_info(ErrorInfo {
				span: command.span,
				command: command.text,
				message: err.to_string(),
			});
			Err(err.into())
		}
	}
}

async fn undo_last(state: &RwLock<SessionState>, transport: &dyn ProverTransport, dialect: Dialect) -> Result<()> {
	let Some(record) = state.write().remove_last_command() else {
		return Ok(());
	};
	let undo = dialect.undo_command(&record.command);
	debug!(command = %record.command, undo, "undo");

	state.write().set_loading(true);
	let result = transport.send(undo).await;
	state.write().set_loading(false);

	result.map(drop).map_err(|err| {
		warn!(command = %record.command, error = %err, "undo failed; prover state may have diverged");
		err.into()
	})
}
