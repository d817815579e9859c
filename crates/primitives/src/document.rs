use std::borrow::Cow;

use ropey::Rope;

use crate::position::Position;

/// Read access to document text by line.
///
/// Lines are returned without their line terminator; characters are counted in
/// Unicode scalar values. Only LF and CRLF end a line. A lone CR, NEL or U+2028
/// is ordinary text, for [`Rope`] and `str` alike.
pub trait DocumentAccessor {
	/// Number of lines, including the empty line after a trailing newline.
	fn line_count(&self) -> usize;

	/// Text of line `line` without its terminator, or `None` past the end.
	fn line_text(&self, line: usize) -> Option<Cow<'_, str>>;

	/// Position just past the last character of the document.
	fn end_position(&self) -> Position {
		let last = self.line_count().saturating_sub(1);
		let len = self.line_text(last).map_or(0, |text| text.chars().count());
		Position::new(last as u32, len as u32)
	}

	/// Length of line `line` after trimming trailing whitespace.
	fn trimmed_line_len(&self, line: usize) -> usize {
		self.line_text(line).map_or(0, |text| text.trim_end().chars().count())
	}
}

fn strip_terminator(line: &str) -> &str {
	let line = line.strip_suffix('\n').unwrap_or(line);
	line.strip_suffix('\r').unwrap_or(line)
}

impl DocumentAccessor for Rope {
	fn line_count(&self) -> usize {
		self.len_lines()
	}

	fn line_text(&self, line: usize) -> Option<Cow<'_, str>> {
		let slice = self.get_line(line)?;
		let text: Cow<'_, str> = slice.into();
		Some(match text {
			Cow::Borrowed(s) => Cow::Borrowed(strip_terminator(s)),
			Cow::Owned(s) => Cow::Owned(strip_terminator(&s).to_owned()),
		})
	}
}

impl DocumentAccessor for str {
	fn line_count(&self) -> usize {
		self.split('\n').count()
	}

	fn line_text(&self, line: usize) -> Option<Cow<'_, str>> {
		self.split('\n').nth(line).map(|text| Cow::Borrowed(strip_terminator(text)))
	}
}
