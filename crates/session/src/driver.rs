//! Turns editor events into execute and undo operations.
//!
//! Each synchronization pass first applies any pending edit (clear a stale
//! error, undo every record the edit touched, remember the new text), then
//! executes the commands between the evaluated range and the cursor, and
//! finally publishes decorations and the output for the cursor position.
//!
//! Edits and cursor moves are debounced separately. Passes never overlap: a
//! pass triggered while another runs waits for it to finish. A pass works on
//! the text and pending edit it took when it started; edits arriving during
//! the pass are left for the next one.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use ropey::Rope;
use tracing::{debug, trace};
use vellum_primitives::{Position, Selection};
use vellum_worker::Debouncer;

use crate::config::SessionConfig;
use crate::executor::CommandExecutor;
use crate::sink::{InfoUpdate, Sinks};
use crate::state::SessionState;
use crate::tokenizer::{Command, tokenize_to};
use crate::Error;


/// Latest document text and selection seen by the driver.
#[derive(Debug, Clone, Default)]
pub struct EditorSnapshot {
	pub text: Rope,
	pub selection: Selection,
}

/// How a synchronization pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
	/// Everything up to the cursor is evaluated; `executed` commands were sent.
	Completed { executed: usize },
	/// A command was rejected or an undo failed. The error, if any, is in the
	/// session state.
	Stopped,
	/// The operation queue was cleared under the pass.
	Cancelled,
}

/// Diagnostic snapshot of the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverStatus {
	pub pass_running: bool,
	pub commands_processing: bool,
	pub queue_size: usize,
}

/// Synchronizes the prover with the editor.
pub struct SyncDriver {
	inner: Arc<DriverInner>,
	cursor_debounce: Debouncer,
	edit_debounce: Debouncer,
}

struct DriverInner {
	executor: CommandExecutor,
	state: Arc<RwLock<SessionState>>,
	sinks: Sinks,
	editor: Mutex<EditorTracking>,
	pass_lock: tokio::sync::Mutex<()>,
	pass_running: AtomicBool,
	shut_down: AtomicBool,
	presentation_open: AtomicBool,
	last_info: Mutex<Option<InfoUpdate>>,
}

/// Editor view and the edit not yet applied, always updated together.
#[derive(Default)]
struct EditorTracking {
	snapshot: EditorSnapshot,
	/// Earliest change across edits not yet applied by a pass.
	pending_edit: Option<Position>,
}

impl EditorTracking {
	fn merge_edit(&mut self, changed: Position) {
		self.pending_edit = Some(self.pending_edit.map_or(changed, |prev| prev.min(changed)));
	}
}

impl std::fmt::Debug for SyncDriver {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SyncDriver").field("status", &self.status()).finish_non_exhaustive()
	}
}

impl SyncDriver {
	/// Creates a driver. Must be called inside a tokio runtime.
	pub fn new(executor: CommandExecutor, state: Arc<RwLock<SessionState>>, sinks: Sinks, config: &SessionConfig) -> Self {
		let inner = Arc::new(DriverInner {
			executor,
			state,
			sinks,
			editor: Mutex::default(),
			pass_lock: tokio::sync::Mutex::new(()),
			pass_running: AtomicBool::new(false),
			shut_down: AtomicBool::new(false),
			presentation_open: AtomicBool::new(config.auto_display),
			last_info: Mutex::new(None),
		});
		Self {
			inner,
			cursor_debounce: Debouncer::new(config.cursor_debounce()),
			edit_debounce: Debouncer::new(config.edit_debounce()),
		}
	}

	/// Initial fill after the prover started: evaluates up to the cursor.
	pub async fn load(&self, text: Rope, selection: Selection) -> PassOutcome {
		self.inner.state.write().set_file_content(Some(text.clone()));
		self.inner.editor.lock().snapshot = EditorSnapshot { text, selection };
		self.inner.pass().await
	}

	/// Records an edit and schedules a debounced pass.
	///
	/// `changes` are the start positions of the edit's content changes.
	pub fn on_text_change<I>(&self, text: Rope, selection: Selection, changes: I)
	where
		I: IntoIterator<Item = Position>,
	{
		self.inner.record_edit(text, selection, changes);
		let inner = Arc::clone(&self.inner);
		self.edit_debounce.trigger(async move {
			let outcome = inner.pass().await;
			trace!(?outcome, "debounced edit pass");
		});
	}

	/// Records a cursor move and schedules a debounced pass.
	pub fn on_cursor_move(&self, selection: Selection) {
		self.inner.editor.lock().snapshot.selection = selection;
		let inner = Arc::clone(&self.inner);
		self.cursor_debounce.trigger(async move {
			let outcome = inner.pass().await;
			trace!(?outcome, "debounced cursor pass");
		});
	}

	/// Records an edit and synchronizes immediately.
	pub async fn sync_text_change<I>(&self, text: Rope, selection: Selection, changes: I) -> PassOutcome
	where
		I: IntoIterator<Item = Position>,
	{
		self.inner.record_edit(text, selection, changes);
		self.inner.pass().await
	}

	/// Synchronizes up to the current cursor immediately.
	pub async fn sync_to_cursor(&self) -> PassOutcome {
		self.inner.pass().await
	}

	/// What the presentation shows for `pos`.
	pub fn info_at(&self, pos: Position) -> InfoUpdate {
		self.inner.info_at(pos)
	}

	/// The last content published (or withheld while the presentation is closed).
	pub fn current_info(&self) -> Option<InfoUpdate> {
		self.inner.last_info.lock().clone()
	}

	/// Opens the presentation and republishes the current content.
	pub fn open_presentation(&self) {
		self.inner.presentation_open.store(true, Ordering::Release);
		self.inner.sinks.presentation.open();
		let cursor = self.inner.editor.lock().snapshot.selection.active;
		self.inner.present(self.inner.info_at(cursor));
	}

	pub fn is_presentation_open(&self) -> bool {
		self.inner.presentation_open.load(Ordering::Acquire)
	}

	/// Drops debounced passes that have not started yet.
	pub fn cancel_pending(&self) {
		self.cursor_debounce.cancel();
		self.edit_debounce.cancel();
		self.inner.editor.lock().pending_edit = None;
	}

	/// Stops the driver for good. Passes still waiting to run, or finishing
	/// after this call, end as [`PassOutcome::Cancelled`] without publishing.
	pub fn shut_down(&self) {
		self.inner.shut_down.store(true, Ordering::Release);
		self.cancel_pending();
	}

	pub fn is_shut_down(&self) -> bool {
		self.inner.is_shut_down()
	}

	/// Returns true while a debounced pass waits for its quiet period.
	pub fn has_pending(&self) -> bool {
		self.cursor_debounce.is_pending() || self.edit_debounce.is_pending()
	}

	pub fn executor(&self) -> &CommandExecutor {
		&self.inner.executor
	}

	pub fn status(&self) -> DriverStatus {
		DriverStatus {
			pass_running: self.inner.pass_running.load(Ordering::Acquire),
			commands_processing: self.inner.executor.is_processing(),
			queue_size: self.inner.executor.queue_size(),
		}
	}
}

/// Holds the pass lock and clears the running flag when dropped.
struct PassGuard<'a> {
	_lock: tokio::sync::MutexGuard<'a, ()>,
	running: &'a AtomicBool,
}

impl Drop for PassGuard<'_> {
	fn drop(&mut self) {
		self.running.store(false, Ordering::Release);
	}
}

impl DriverInner {
	fn record_edit<I>(&self, text: Rope, selection: Selection, changes: I)
	where
		I: IntoIterator<Item = Position>,
	{
		let fallback = Position::new(text.len_lines() as u32, 0);
		let earliest = changes.into_iter().min().unwrap_or(fallback);
		let mut editor = self.editor.lock();
		editor.merge_edit(earliest);
		editor.snapshot = EditorSnapshot { text, selection };
	}

	fn is_shut_down(&self) -> bool {
		self.shut_down.load(Ordering::Acquire)
	}

	async fn begin_pass(&self) -> PassGuard<'_> {
		let lock = self.pass_lock.lock().await;
		self.pass_running.store(true, Ordering::Release);
		PassGuard {
			_lock: lock,
			running: &self.pass_running,
		}
	}

	async fn pass(&self) -> PassOutcome {
		let _pass = self.begin_pass().await;
		if self.is_shut_down() {
			return PassOutcome::Cancelled;
		}

		let (snapshot, changed) = {
			let mut editor = self.editor.lock();
			(editor.snapshot.clone(), editor.pending_edit.take())
		};
		let outcome = match self.apply_edit(changed, &snapshot.text).await {
			Ok(()) => self.execute(self.fresh_commands(&snapshot)).await,
			Err(outcome) => outcome,
		};

		if self.is_shut_down() {
			return PassOutcome::Cancelled;
		}
		self.publish();
		outcome
	}

	/// Clears a stale error, undoes every record the edit touched and stores
	/// `text`. A failed undo puts the edit back so the next pass retries it.
	async fn apply_edit(&self, changed: Option<Position>, text: &Rope) -> Result<(), PassOutcome> {
		let Some(changed) = changed else {
			return Ok(());
		};

		{
			let mut state = self.state.write();
			if state.error_info().is_some_and(|error| changed <= error.span.end) {
				let cleared = state.clear_error_info();
				debug!(position = %changed, cleared = ?cleared.map(|e| e.command), "edit invalidates error");
			}
		}

		let undone = self.executor.undo_to(changed).await;
		self.state.write().set_file_content(Some(text.clone()));
		undone.map_err(|err| {
			if !err.is_cleared() {
				debug!(position = %changed, "undo failed; edit kept for the next pass");
				self.editor.lock().merge_edit(changed);
			}
			pass_stopped(err)
		})
	}

	/// Commands between the evaluated range and the cursor, stopping before
	/// the recorded error.
	fn fresh_commands(&self, snapshot: &EditorSnapshot) -> Vec<Command> {
		let state = self.state.read();
		let evaluated_end = state.evaluated_range().end;
		let error_start = state.error_info().map(|error| error.span.start);
		tokenize_to(&snapshot.text, snapshot.selection.end())
			.into_iter()
			.filter(|command| command.span.start >= evaluated_end)
			.take_while(|command| error_start.is_none_or(|start| command.span.start < start))
			.collect()
	}

	async fn execute(&self, commands: Vec<Command>) -> PassOutcome {
		let executed = commands.len();
		if executed == 0 {
			return PassOutcome::Completed { executed };
		}
		match self.executor.execute(commands).await {
			Ok(()) => PassOutcome::Completed { executed },
			Err(err) => pass_stopped(err),
		}
	}

	fn publish(&self) {
		let (evaluated, error, lines) = {
			let state = self.state.read();
			(state.evaluated_range(), state.error_info().map(|error| error.span), state.line_statuses())
		};
		self.sinks.decorations.update(evaluated, error, &lines);

		let cursor = self.editor.lock().snapshot.selection.active;
		self.present(self.info_at(cursor));
	}

	fn present(&self, info: InfoUpdate) {
		*self.last_info.lock() = Some(info.clone());
		if self.presentation_open.load(Ordering::Acquire) {
			self.sinks.presentation.update(info);
		}
	}

	fn info_at(&self, pos: Position) -> InfoUpdate {
		let state = self.state.read();
		if let Some(error) = state.error_info().filter(|error| error.span.start <= pos) {
			return InfoUpdate::command(&error.command, &error.message);
		}
		match state.last_command_before_position(pos) {
			Some(record) => InfoUpdate::command(&record.command, &record.output),
			None => InfoUpdate::message(InfoUpdate::NO_COMMAND),
		}
	}
}

fn pass_stopped(err: Error) -> PassOutcome {
	if err.is_cleared() {
		debug!("synchronization pass cancelled");
		PassOutcome::Cancelled
	} else {
		debug!(error = %err, "synchronization pass stopped");
		PassOutcome::Stopped
	}
}
