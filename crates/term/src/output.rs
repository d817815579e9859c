//! Stdout rendering of session output.

use std::collections::BTreeMap;
use std::io::Write;

use parking_lot::Mutex;
use vellum_primitives::Span;
use vellum_session::{DecorationSink, InfoUpdate, LineStatus, PresentationSink};

/// Prints presentation updates and keeps the latest decorations for `--status`.
#[derive(Debug, Default)]
pub struct StdoutSink {
	lines: Mutex<BTreeMap<u32, LineStatus>>,
	evaluated: Mutex<Span>,
}

impl StdoutSink {
	/// Writes one `line: status` row per decorated line (1-based).
	pub fn write_status(&self, out: &mut impl Write) -> std::io::Result<()> {
		writeln!(out, "evaluated: {}", *self.evaluated.lock())?;
		for (line, status) in self.lines.lock().iter() {
			writeln!(out, "{:>5}: {}", line + 1, status.as_str())?;
		}
		Ok(())
	}
}

impl PresentationSink for StdoutSink {
	fn update(&self, info: InfoUpdate) {
		let mut out = std::io::stdout().lock();
		let _ = match info {
			InfoUpdate::Code(text) => writeln!(out, "{text}\n"),
			InfoUpdate::Message(text) => writeln!(out, "{text}"),
		};
	}
}

impl DecorationSink for StdoutSink {
	fn update(&self, evaluated: Span, _error: Option<Span>, lines: &BTreeMap<u32, LineStatus>) {
		*self.evaluated.lock() = evaluated;
		*self.lines.lock() = lines.clone();
	}
}
