//! Session state: the accepted history and everything derived from it.
//!
//! History order, document order and prover acceptance order always coincide:
//! records are only ever pushed at the end (after the evaluated range) and
//! popped from the end.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use ropey::Rope;
use vellum_primitives::{DocumentAccessor, Position, Span};

use crate::tokenizer::Command;
use crate::{Error, Result};

/// A command the prover accepted, with its reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRecord {
	pub span: Span,
	pub command: String,
	pub output: String,
}

impl CommandRecord {
	/// Pairs a tokenized command with the prover's reply.
	pub fn accepted(command: Command, output: impl Into<String>) -> Self {
		Self {
			span: command.span,
			command: command.text,
			output: output.into(),
		}
	}
}

/// The first command after the evaluated range that the prover rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
	pub span: Span,
	pub command: String,
	pub message: String,
}

/// Decoration status of one document line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineStatus {
	/// Every command on the line up to its trimmed end was accepted.
	FullyProcessed,
	/// The evaluated range ends inside the line.
	PartiallyProcessed,
	/// The rejected command starts on this line.
	Error,
}

impl LineStatus {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::FullyProcessed => "fully-processed",
			Self::PartiallyProcessed => "partially-processed",
			Self::Error => "error",
		}
	}
}

/// State of one prover session.
///
/// Mutated only by the command executor while it holds the operation queue;
/// everyone else reads snapshots.
#[derive(Debug, Default)]
pub struct SessionState {
	history: Vec<CommandRecord>,
	error: Option<ErrorInfo>,
	pending: HashSet<String>,
	file_path: Option<PathBuf>,
	file_content: Option<Rope>,
	loading: bool,
	last_successful: Position,
}

impl SessionState {
	pub fn new() -> Self {
		Self::default()
	}

	/// Accepted records in document order.
	pub fn history(&self) -> &[CommandRecord] {
		&self.history
	}

	pub fn error_info(&self) -> Option<&ErrorInfo> {
		self.error.as_ref()
	}

	pub fn set_error_info(&mut self, error: ErrorInfo) {
		self.error = Some(error);
	}

	pub fn clear_error_info(&mut self) -> Option<ErrorInfo> {
		self.error.take()
	}

	/// Commands sent to the prover and not yet acknowledged.
	pub fn pending_commands(&self) -> &HashSet<String> {
		&self.pending
	}

	pub fn add_pending(&mut self, command: &str) {
		self.pending.insert(command.to_owned());
	}

	pub fn remove_pending(&mut self, command: &str) {
		self.pending.remove(command);
	}

	pub fn file_path(&self) -> Option<&PathBuf> {
		self.file_path.as_ref()
	}

	pub fn set_file_path(&mut self, path: Option<PathBuf>) {
		self.file_path = path;
	}

	/// Raw text of the document as last synchronized.
	pub fn file_content(&self) -> Option<&Rope> {
		self.file_content.as_ref()
	}

	pub fn set_file_content(&mut self, content: Option<Rope>) {
		self.file_content = content;
	}

	/// True while an undo is being sent to the prover.
	pub fn is_loading(&self) -> bool {
		self.loading
	}

	pub fn set_loading(&mut self, loading: bool) {
		self.loading = loading;
	}

	/// `[first.start, last.end]` of the history, or the empty span at the origin.
	pub fn evaluated_range(&self) -> Span {
		match (self.history.first(), self.history.last()) {
			(Some(first), Some(last)) => Span::new(first.span.start, last.span.end),
			_ => Span::EMPTY,
		}
	}

	/// End of the last accepted record, or the origin.
	pub fn last_successful_position(&self) -> Position {
		self.last_successful
	}

	/// Appends an accepted record.
	///
	/// Fails with [`Error::OutOfOrder`] if the record starts before the end of
	/// the evaluated range.
	pub fn add_command(&mut self, record: CommandRecord) -> Result<()> {
		self.check_order(record.span)?;
		self.last_successful = record.span.end;
		self.pending.remove(&record.command);
		self.history.push(record);
		Ok(())
	}

	/// Fails with [`Error::OutOfOrder`] unless `span` starts at or after the end
	/// of the evaluated range.
	pub fn check_order(&self, span: Span) -> Result<()> {
		let evaluated_end = self.evaluated_range().end;
		if !self.history.is_empty() && span.start < evaluated_end {
			return Err(Error::OutOfOrder {
				start: span.start,
				evaluated_end,
			});
		}
		Ok(())
	}

	/// Pops the most recent record.
	pub fn remove_last_command(&mut self) -> Option<CommandRecord> {
		let removed = self.history.pop();
		self.last_successful = self.history.last().map_or(Position::ZERO, |last| last.span.end);
		removed
	}

	/// Records starting at or after `pos`.
	pub fn commands_after_position(&self, pos: Position) -> impl Iterator<Item = &CommandRecord> {
		self.history.iter().filter(move |record| record.span.start >= pos)
	}

	/// Records ending at or after `pos`, including one whose span contains it.
	pub fn commands_touching_position(&self, pos: Position) -> impl Iterator<Item = &CommandRecord> {
		self.history.iter().filter(move |record| record.span.end >= pos)
	}

	/// Most recent record ending at or before `pos`.
	pub fn last_command_before_position(&self, pos: Position) -> Option<&CommandRecord> {
		self.history.iter().rev().find(|record| record.span.end <= pos)
	}

	/// Per-line decoration status.
	///
	/// The line holding the error's start is [`LineStatus::Error`]. Every other
	/// line up to the end of the evaluated range is fully processed, except the
	/// last one, which is partial if the range stops before its trimmed length.
	pub fn line_statuses(&self) -> BTreeMap<u32, LineStatus> {
		let mut statuses = BTreeMap::new();
		if let Some(error) = &self.error {
			statuses.insert(error.span.start.line, LineStatus::Error);
		}
		if self.history.is_empty() {
			return statuses;
		}

		let end = self.evaluated_range().end;
		for line in 0..=end.line {
			if statuses.contains_key(&line) {
				continue;
			}
			let status = if line == end.line {
				let trimmed = self.file_content.as_ref().map_or(0, |text| text.trimmed_line_len(line as usize));
				if (end.character as usize) < trimmed {
					LineStatus::PartiallyProcessed
				} else {
					LineStatus::FullyProcessed
				}
			} else {
				LineStatus::FullyProcessed
			};
			statuses.insert(line, status);
		}
		statuses
	}

	/// Forgets everything, as on session teardown.
	pub fn reset(&mut self) {
		*self = Self::default();
	}
}
