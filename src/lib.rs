//! # Tessera Buffer
//!
//! The document engine of the Tessera editor: a piece-chain text buffer
//! with transactional undo/redo, a saved-state mark, and the
//! position-shift algorithm that keeps externally-owned cursors,
//! selections, highlights and bookmarks valid as the buffer mutates.
//!
//! ## Why a piece chain?
//!
//! Loaded text is never copied and never moves: the document is a chain
//! of pieces slicing two append-only buffers, so edits are list surgery
//! and undo is swapping a run of pieces back into place. Compared to a
//! rope this trades O(log n) random access for edits that are trivially
//! reversible, which is the property an editor's undo history actually
//! leans on.
//!
//! ## Layout
//!
//! - [`PieceTable`] is the core engine: insert, delete, set, undo/redo,
//!   transactions, mark.
//! - [`TextBuffer`] wraps it for editor use, adding snapshot caching and
//!   the cut-then-paste squash.
//! - [`Span::shifted`] is the one function every position owner calls
//!   after every edit.
//!
//! ## Ownership
//!
//! All mutators take `&mut self`; the engine has no interior locking and
//! expects a single logical writer. Hand [`PieceTable::bytes`] snapshots
//! to background work, never the table itself.

mod cache;
mod piece;
mod shift;
mod table;

pub use cache::TextBuffer;
pub use piece::{BufferId, Piece};
pub use shift::{Boundary, Span};
pub use table::PieceTable;

/// Result type for the checked buffer operations.
pub type BufferResult<T> = Result<T, BufferError>;

/// Errors reported by the checked (`try_`) operations. The primary
/// mutators treat the same conditions as silent no-ops, by contract:
/// the table tolerates callers working from slightly stale state rather
/// than crash the editor.
#[derive(Debug, thiserror::Error)]
pub enum BufferError {
    #[error("index {index} is out of bounds (document holds {len} runes)")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("range at {index} of {count} runes is out of bounds (document holds {len} runes)")]
    RangeOutOfBounds {
        index: usize,
        count: usize,
        len: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_creation() {
        let table = PieceTable::<()>::new();
        assert!(table.is_empty());
        assert_eq!(table.len(), 0);
        assert_eq!(table.text(), "");
    }

    #[test]
    fn test_buffer_from_string() {
        let table = PieceTable::<()>::from("Hello, World!");
        assert_eq!(table.len(), 13);
        assert_eq!(table.text(), "Hello, World!");
    }

    #[test]
    fn test_insert_and_delete() {
        let mut buffer = TextBuffer::<()>::new();
        buffer.insert(0, "Hello");
        assert_eq!(buffer.text(), "Hello");

        buffer.insert(5, ", World!");
        assert_eq!(buffer.text(), "Hello, World!");

        buffer.delete(5, 2);
        assert_eq!(buffer.text(), "HelloWorld!");
    }

    #[test]
    fn test_undo_redo() {
        let mut buffer = TextBuffer::<()>::new();
        buffer.insert(0, "Hello");
        buffer.delete(0, 1);
        assert_eq!(buffer.text(), "ello");

        buffer.undo();
        assert_eq!(buffer.text(), "Hello");

        buffer.redo();
        assert_eq!(buffer.text(), "ello");
    }

    #[test]
    fn test_edit_then_shift() {
        // the calling pattern: mutate, then shift every tracked interval
        let mut buffer = TextBuffer::<()>::from("fn main() {}");
        let mut highlight = Span::new(3, 7); // "main"

        buffer.delete(3, 4);
        highlight = highlight.shifted(3, -4, Boundary::Inclusive);
        assert_eq!(buffer.text(), "fn () {}");
        assert_eq!(highlight, Span::cursor(3));

        buffer.insert(3, "run");
        highlight = highlight.shifted(3, 3, Boundary::Inclusive);
        assert_eq!(buffer.text(), "fn run() {}");
        assert_eq!(highlight, Span::new(3, 6));
    }
}
