//! Core types for describing positions in a proof document.

/// Line/column accessors over document text.
pub mod document;
/// Async future aliases.
pub mod future;
/// Line/character positions and half-open spans.
pub mod position;
/// Cursor selections (anchor and active point).
pub mod selection;

pub use document::DocumentAccessor;
pub use future::BoxFutureStatic;
pub use position::{Position, Span};
pub use ropey::Rope;
pub use selection::Selection;
