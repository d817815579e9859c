//! Protocol abstraction for prover dialects.

use std::fmt;

use serde::Deserialize;

/// Outcome of inspecting the stdout bytes buffered for the outstanding command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
	/// No reply terminator yet; keep reading.
	Incomplete,
	/// The reply is complete; carries the payload with prompt echoes removed.
	Reply(String),
	/// The stdout text itself signals a failed command.
	Rejected(String),
}

/// Binding between the channel and a concrete prover's REPL conventions.
pub trait Protocol: Send + Sync + 'static {
	/// Human-readable dialect name used in logs.
	fn name(&self) -> &str;

	/// Marker that ends a reply on stdout (the prover's prompt).
	fn terminator(&self) -> &str;

	/// Bytes written to stdin for `command`.
	///
	/// Defaults to the command followed by a carriage return.
	fn encode_command(&self, command: &str) -> Vec<u8> {
		let mut bytes = Vec::with_capacity(command.len() + 1);
		bytes.extend_from_slice(command.as_bytes());
		bytes.push(b'\r');
		bytes
	}

	/// Classifies the stdout text buffered so far for the outstanding command.
	fn frame(&self, buffered: &str) -> Frame {
		frame_at_terminator(buffered, self.terminator())
	}

	/// Command that reverts `undone`, the most recently accepted command.
	fn undo_command(&self, undone: &str) -> &'static str {
		if undone.trim_start().starts_with("Theorem") { "abort." } else { "undo." }
	}
}

/// Completes the reply once `terminator` has been seen.
pub fn frame_at_terminator(buffered: &str, terminator: &str) -> Frame {
	if buffered.contains(terminator) {
		Frame::Reply(strip_prompts(buffered, terminator))
	} else {
		Frame::Incomplete
	}
}

/// Removes, on every line, everything up to and including the last
/// `terminator`, then trims the result.
///
/// Provers echo their prompt before each reply and print a fresh one after it,
/// so this leaves only the reply text.
pub fn strip_prompts(buffered: &str, terminator: &str) -> String {
	let stripped: Vec<&str> = buffered
		.split('\n')
		.map(|line| match line.rfind(terminator) {
			Some(idx) => &line[idx + terminator.len()..],
			None => line,
		})
		.collect();
	stripped.join("\n").trim().to_string()
}

/// Built-in prover dialects.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
	/// Adelfa: prompt `>>`, failures on stderr.
	#[default]
	Adelfa,
	/// Abella: prompt `<`, failures on stderr or any stdout mentioning `error`.
	Abella,
}

impl Dialect {
	/// Executable name used when no explicit path is configured.
	pub const fn default_program(self) -> &'static str {
		match self {
			Self::Adelfa => "adelfa",
			Self::Abella => "abella",
		}
	}
}

impl fmt::Display for Dialect {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

impl Protocol for Dialect {
	fn name(&self) -> &str {
		match self {
			Self::Adelfa => "adelfa",
			Self::Abella => "abella",
		}
	}

	fn terminator(&self) -> &str {
		match self {
			Self::Adelfa => ">>",
			Self::Abella => "<",
		}
	}

	fn frame(&self, buffered: &str) -> Frame {
		if *self == Self::Abella && buffered.to_lowercase().contains("error") {
			return Frame::Rejected(buffered.trim().to_string());
		}
		frame_at_terminator(buffered, self.terminator())
	}
}
