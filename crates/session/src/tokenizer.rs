//! Splits document text into top-level commands.
//!
//! A command ends at a `.` outside a string literal. `%` outside a string
//! starts a comment running to the end of the line, and `"` toggles string
//! mode. Text after the last terminator is not a command yet and is ignored.

use vellum_primitives::{DocumentAccessor, Position, Span};

/// One top-level command as it appears in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
	/// From the first non-blank character through the terminating `.`.
	pub span: Span,
	/// Source text, trimmed, with line breaks preserved.
	pub text: String,
}

impl Command {
	pub fn new(span: Span, text: impl Into<String>) -> Self {
		Self { span, text: text.into() }
	}
}

/// Returns the commands terminated inside `range`, in document order.
///
/// Scanning is a pure function of the text: equal input always yields equal
/// output, and the returned spans never overlap.
pub fn tokenize<D>(doc: &D, range: Span) -> Vec<Command>
where
	D: DocumentAccessor + ?Sized,
{
	let mut commands = Vec::new();
	let line_count = doc.line_count();
	if line_count == 0 || range.is_empty() {
		return commands;
	}

	let first_line = range.start.line as usize;
	let last_line = (range.end.line as usize).min(line_count - 1);
	let mut current = String::new();
	let mut start = range.start;
	let mut in_string = false;

	for line in first_line..=last_line {
		let Some(text) = doc.line_text(line) else { break };
		let from = if line == first_line { range.start.character as usize } else { 0 };
		let to = if line as u32 == range.end.line { range.end.character as usize } else { usize::MAX };

		if line > first_line && !current.is_empty() {
			current.push('\n');
		}

		for (col, ch) in text.chars().enumerate().skip(from).take(to.saturating_sub(from)) {
			if ch == '%' && !in_string {
				break;
			}
			if current.trim().is_empty() {
				start = Position::new(line as u32, col as u32);
			}
			current.push(ch);

			if ch == '"' {
				in_string = !in_string;
			} else if ch == '.' && !in_string {
				let end = Position::new(line as u32, col as u32 + 1);
				commands.push(Command::new(Span::new(start, end), current.trim()));
				current.clear();
			}
		}
	}

	commands
}

/// Commands from the start of the document up to `end`.
pub fn tokenize_to<D>(doc: &D, end: Position) -> Vec<Command>
where
	D: DocumentAccessor + ?Sized,
{
	tokenize(doc, Span::new(Position::ZERO, end))
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use proptest::prelude::*;
	use vellum_primitives::Rope;

	use super::*;

	fn span(sl: u32, sc: u32, el: u32, ec: u32) -> Span {
		Span::new(Position::new(sl, sc), Position::new(el, ec))
	}

	fn all(text: &str) -> Vec<Command> {
		tokenize_to(text, text.end_position())
	}

	#[test]
	fn three_commands_on_one_line() {
		assert_eq!(
			all("a. b. c."),
			vec![
				Command::new(span(0, 0, 0, 2), "a."),
				Command::new(span(0, 3, 0, 5), "b."),
				Command::new(span(0, 6, 0, 8), "c."),
			]
		);
	}

	#[test]
	fn multi_line_command_joins_lines() {
		let text = "Theorem refl :\n  forall x, x = x.\nintros.";
		assert_eq!(
			all(text),
			vec![
				Command::new(span(0, 0, 1, 18), "Theorem refl :\n  forall x, x = x."),
				Command::new(span(2, 0, 2, 7), "intros."),
			]
		);
	}

	#[test]
	fn comments_and_strings_hide_terminators() {
		let text = "% header. not a command\nSpecification \"nat.lf\". % trailing.\n";
		assert_eq!(all(text), vec![Command::new(span(1, 0, 1, 23), "Specification \"nat.lf\".")]);
	}

	#[test]
	fn unterminated_tail_is_dropped() {
		assert_eq!(all("nat : type.\nz : nat"), vec![Command::new(span(0, 0, 0, 11), "nat : type.")]);
	}

	#[test]
	fn range_end_cuts_scan() {
		let text = "nat : type.\nz : nat.";
		assert_eq!(tokenize_to(text, Position::new(1, 4)).len(), 1);
		assert_eq!(tokenize_to(text, Position::new(1, 8)).len(), 2);
	}

	#[test]
	fn range_start_skips_earlier_text() {
		let text = "a. b. c.";
		let commands = tokenize(text, span(0, 2, 0, 8));
		assert_eq!(commands[0], Command::new(span(0, 3, 0, 5), "b."));
		assert_eq!(commands.len(), 2);
	}

	#[test]
	fn rope_and_str_agree() {
		let text = "nat : type.\r\nz : nat.\ns : nat -> nat.";
		assert_eq!(all(text), tokenize_to(&Rope::from(text), text.end_position()));
	}

	proptest! {
		#[test]
		fn rescanning_is_idempotent(text in "[a-z .%\"\n]{0,80}") {
			prop_assert_eq!(all(&text), all(&text));
		}

		#[test]
		fn spans_are_ordered_and_disjoint(text in "[a-z .%\"\n]{0,80}") {
			let commands = all(&text);
			for pair in commands.windows(2) {
				prop_assert!(pair[0].span.end <= pair[1].span.start);
				prop_assert!(!pair[0].span.overlaps(&pair[1].span));
			}
			for command in &commands {
				prop_assert!(command.span.start < command.span.end);
				prop_assert!(command.text.ends_with('.'));
			}
		}
	}
}
