use std::fmt;

/// Document position in line/character coordinates.
///
/// Ordering is lexicographic: first by line, then by character.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
	/// Zero-based line index.
	pub line: u32,
	/// Zero-based character offset in the line.
	pub character: u32,
}

impl Position {
	/// The document origin `(0, 0)`.
	pub const ZERO: Self = Self::new(0, 0);

	/// Creates a new position.
	pub const fn new(line: u32, character: u32) -> Self {
		Self { line, character }
	}
}

impl fmt::Display for Position {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.line, self.character)
	}
}

/// Half-open span `[start, end)` over document positions.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
	/// Start position (inclusive).
	pub start: Position,
	/// End position (exclusive).
	pub end: Position,
}

impl Span {
	/// An empty span at the document origin.
	pub const EMPTY: Self = Self::point(Position::ZERO);

	/// Creates a new span.
	pub const fn new(start: Position, end: Position) -> Self {
		Self { start, end }
	}

	/// Creates a zero-length span at a position.
	pub const fn point(pos: Position) -> Self {
		Self { start: pos, end: pos }
	}

	/// Returns true if the span covers no characters.
	pub fn is_empty(&self) -> bool {
		self.start >= self.end
	}

	/// Returns true if `pos` lies inside the span.
	pub fn contains(&self, pos: Position) -> bool {
		self.start <= pos && pos < self.end
	}

	/// Returns true if both spans share at least one character.
	pub fn overlaps(&self, other: &Span) -> bool {
		!self.is_empty() && !other.is_empty() && self.start < other.end && other.start < self.end
	}

	/// Smallest span covering both `self` and `other`.
	pub fn union(&self, other: &Span) -> Span {
		Span::new(self.start.min(other.start), self.end.max(other.end))
	}
}

impl fmt::Display for Span {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}..{}", self.start, self.end)
	}
}
