//! Collaborators the session reports to.

use std::collections::BTreeMap;
use std::sync::Arc;

use vellum_primitives::Span;

use crate::state::LineStatus;

/// Content for the output presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfoUpdate {
	/// A command and its reply (or error), rendered as code.
	Code(String),
	/// A human-readable status line.
	Message(String),
}

impl InfoUpdate {
	pub const LOADING: &'static str = "Loading file";
	pub const NO_COMMAND: &'static str = "No command found";

	/// `>> command` followed by a blank line and the output.
	pub fn command(command: &str, output: &str) -> Self {
		Self::Code(format!(">> {command}\n\n{output}"))
	}

	pub fn message(text: impl Into<String>) -> Self {
		Self::Message(text.into())
	}
}

/// Receives what the prover said about the command at the cursor.
pub trait PresentationSink: Send + Sync {
	/// Replaces the presented content.
	fn update(&self, info: InfoUpdate);

	/// Makes the presentation visible.
	fn open(&self) {}
}

/// Receives editor decorations after every synchronization pass.
pub trait DecorationSink: Send + Sync {
	fn update(&self, evaluated: Span, error: Option<Span>, lines: &BTreeMap<u32, LineStatus>);
}

/// Sink that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl PresentationSink for NullSink {
	fn update(&self, _info: InfoUpdate) {}
}

impl DecorationSink for NullSink {
	fn update(&self, _evaluated: Span, _error: Option<Span>, _lines: &BTreeMap<u32, LineStatus>) {}
}

/// The pair of sinks a session reports to.
#[derive(Clone)]
pub struct Sinks {
	pub presentation: Arc<dyn PresentationSink>,
	pub decorations: Arc<dyn DecorationSink>,
}

impl Sinks {
	pub fn new(presentation: Arc<dyn PresentationSink>, decorations: Arc<dyn DecorationSink>) -> Self {
		Self {
			presentation,
			decorations,
		}
	}
}

impl Default for Sinks {
	fn default() -> Self {
		Self::new(Arc::new(NullSink), Arc::new(NullSink))
	}
}

impl std::fmt::Debug for Sinks {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Sinks").finish_non_exhaustive()
	}
}
