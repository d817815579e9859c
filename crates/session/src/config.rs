//! Session configuration.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use vellum_rpc::Dialect;

use crate::{Error, Result};

/// Configuration read once when a session starts.
///
/// Every field has a default, so a TOML file only needs the keys it changes:
///
/// ```toml
/// prover = "abella"
/// path = "/opt/abella/bin/abella"
/// auto_display = false
/// command_timeout_ms = 0
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
	/// Prover dialect spoken by the subprocess.
	pub prover: Dialect,
	/// Executable to spawn. Defaults to the dialect's program name.
	pub path: Option<String>,
	/// Extra command line arguments.
	pub args: Vec<String>,
	/// Open the output presentation as soon as the session starts.
	pub auto_display: bool,
	/// Per-command reply timeout in milliseconds; `0` disables it.
	pub command_timeout_ms: u64,
	/// How long to wait for the prover's first output.
	pub startup_timeout_ms: u64,
	/// Quiet period before a cursor move is synchronized.
	pub cursor_debounce_ms: u64,
	/// Quiet period before an edit is synchronized.
	pub edit_debounce_ms: u64,
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			prover: Dialect::default(),
			path: None,
			args: Vec::new(),
			auto_display: true,
			command_timeout_ms: 30_000,
			startup_timeout_ms: 5_000,
			cursor_debounce_ms: 100,
			edit_debounce_ms: 300,
		}
	}
}

impl SessionConfig {
	/// Default configuration for `prover`.
	pub fn new(prover: Dialect) -> Self {
		Self {
			prover,
			..Self::default()
		}
	}

	/// Parses a TOML document.
	pub fn from_toml(text: &str) -> Result<Self> {
		toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
	}

	/// Reads and parses a TOML file.
	pub fn load(path: &Path) -> Result<Self> {
		let text = std::fs::read_to_string(path).map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
		Self::from_toml(&text).map_err(|e| match e {
			Error::Config(reason) => Error::Config(format!("{}: {reason}", path.display())),
			other => other,
		})
	}

	/// Set the executable path.
	pub fn path(mut self, path: impl Into<String>) -> Self {
		self.path = Some(path.into());
		self
	}

	/// Set command line arguments.
	pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
		self.args = args.into_iter().map(Into::into).collect();
		self
	}

	/// Set whether the presentation opens on start.
	pub fn auto_display(mut self, auto_display: bool) -> Self {
		self.auto_display = auto_display;
		self
	}

	/// Set the per-command timeout in milliseconds.
	pub fn command_timeout_ms(mut self, ms: u64) -> Self {
		self.command_timeout_ms = ms;
		self
	}

	/// Set the startup timeout in milliseconds.
	pub fn startup_timeout_ms(mut self, ms: u64) -> Self {
		self.startup_timeout_ms = ms;
		self
	}

	/// Set both debounce delays in milliseconds.
	pub fn debounce_ms(mut self, cursor: u64, edit: u64) -> Self {
		self.cursor_debounce_ms = cursor;
		self.edit_debounce_ms = edit;
		self
	}

	/// Executable that will be spawned.
	pub fn program(&self) -> &str {
		self.path.as_deref().unwrap_or(self.prover.default_program())
	}

	/// Per-command timeout, or `None` when disabled.
	pub fn command_timeout(&self) -> Option<Duration> {
		(self.command_timeout_ms > 0).then(|| Duration::from_millis(self.command_timeout_ms))
	}

	pub fn startup_timeout(&self) -> Duration {
		Duration::from_millis(self.startup_timeout_ms)
	}

	pub fn cursor_debounce(&self) -> Duration {
		Duration::from_millis(self.cursor_debounce_ms)
	}

	pub fn edit_debounce(&self) -> Duration {
		Duration::from_millis(self.edit_debounce_ms)
	}
}
