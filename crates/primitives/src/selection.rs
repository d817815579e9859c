use crate::position::Position;

/// A cursor selection: the anchor is the fixed end, `active` is where the cursor is.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
	/// The fixed end of the selection.
	pub anchor: Position,
	/// The moving end of the selection (cursor position).
	pub active: Position,
}

impl Selection {
	/// Creates a selection from anchor to active.
	pub const fn new(anchor: Position, active: Position) -> Self {
		Self { anchor, active }
	}

	/// Creates a collapsed selection (plain cursor).
	pub const fn point(pos: Position) -> Self {
		Self::new(pos, pos)
	}

	/// Returns the smaller of anchor and active.
	#[inline]
	pub fn start(&self) -> Position {
		self.anchor.min(self.active)
	}

	/// Returns the larger of anchor and active.
	#[inline]
	pub fn end(&self) -> Position {
		self.anchor.max(self.active)
	}
}
