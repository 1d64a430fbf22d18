//! The caching decorator around the core engine.
//!
//! Redraw and search read the flattened document far more often than it
//! changes, so the editor-facing wrapper memoizes one snapshot and
//! invalidates it on mutation. It also recognizes the cut-then-paste
//! pattern: a delete immediately re-inserted byte for byte at the same
//! index is executed as an undo of the delete, so a content no-op does
//! not double the undo history.

use crate::table::PieceTable;
use crate::BufferResult;

/// Editor-facing text buffer: a [`PieceTable`] plus snapshot caching and
/// the delete/insert squash.
///
/// Forwards the whole core surface 1:1; only the additions are documented
/// here.
#[derive(Debug, Clone)]
pub struct TextBuffer<T = ()> {
    inner: PieceTable<T>,
    snapshot: Option<String>,
    /// Most recent captured delete, as `(index, deleted text)`.
    last_delete: Option<(usize, String)>,
    save_deletes: bool,
}

fn byte_of(s: &str, index: usize) -> usize {
    s.char_indices().nth(index).map(|(b, _)| b).unwrap_or(s.len())
}

impl<T> TextBuffer<T> {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self {
            inner: PieceTable::new(),
            snapshot: None,
            last_delete: None,
            save_deletes: true,
        }
    }

    /// Wraps an existing table.
    pub fn from_table(inner: PieceTable<T>) -> Self {
        Self {
            inner,
            snapshot: None,
            last_delete: None,
            save_deletes: true,
        }
    }

    /// The wrapped core engine.
    pub fn inner(&self) -> &PieceTable<T> {
        &self.inner
    }

    /// Unwraps the core engine.
    pub fn into_inner(self) -> PieceTable<T> {
        self.inner
    }

    /// When disabled, deletes are not captured for the squash comparison;
    /// bulk and scripted edits skip the extra copy.
    pub fn set_save_deletes(&mut self, on: bool) {
        self.save_deletes = on;
        if !on {
            self.last_delete = None;
        }
    }

    // ==================== Reading ====================

    /// The flattened document, memoized until the next mutation.
    pub fn text(&mut self) -> &str {
        if self.snapshot.is_none() {
            self.snapshot = Some(self.inner.text());
        }
        match &self.snapshot {
            Some(s) => s,
            None => "",
        }
    }

    /// Byte view of the memoized snapshot.
    pub fn bytes(&mut self) -> &[u8] {
        self.text().as_bytes()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn is_marked(&self) -> bool {
        self.inner.is_marked()
    }

    pub fn piece_count(&self) -> usize {
        self.inner.piece_count()
    }

    // ==================== Forwarded mutations ====================

    pub fn set(&mut self, text: &str) {
        self.inner.set(text);
        self.invalidate();
    }

    pub fn set_bytes(&mut self, bytes: &[u8]) {
        self.inner.set_bytes(bytes);
        self.invalidate();
    }

    pub fn set_with_undo(&mut self, text: &str) {
        self.inner.set_with_undo(text);
        self.invalidate();
    }

    pub fn set_bytes_with_undo(&mut self, bytes: &[u8]) {
        self.inner.set_bytes_with_undo(bytes);
        self.invalidate();
    }

    pub fn delete(&mut self, index: usize, count: usize) {
        let captured = self.capture_delete(index, count);
        self.inner.delete(index, count);
        self.snapshot = None;
        self.last_delete = captured;
    }

    pub fn delete_with_data(&mut self, index: usize, count: usize, data: T) {
        let captured = self.capture_delete(index, count);
        self.inner.delete_with_data(index, count, data);
        self.snapshot = None;
        self.last_delete = captured;
    }

    /// Checked form of [`TextBuffer::delete`]; see
    /// [`PieceTable::try_delete`].
    pub fn try_delete(&mut self, index: usize, count: usize) -> BufferResult<()> {
        let captured = self.capture_delete(index, count);
        let result = self.inner.try_delete(index, count);
        if result.is_ok() {
            self.snapshot = None;
            self.last_delete = captured;
        }
        result
    }

    pub fn append(&mut self, text: &str) {
        self.inner.append(text);
        self.invalidate();
    }

    pub fn start_transaction(&mut self) {
        self.inner.start_transaction();
        // a pre-transaction delete must not squash against the
        // transaction's first insert
        self.last_delete = None;
    }

    pub fn end_transaction(&mut self) {
        self.inner.end_transaction();
        self.last_delete = None;
    }

    pub fn mark(&mut self) {
        self.inner.mark();
    }

    pub fn truncate_last_insert(&mut self, count: usize) {
        self.inner.truncate_last_insert(count);
        self.invalidate();
    }

    // ==================== Internals ====================

    fn invalidate(&mut self) {
        self.snapshot = None;
        self.last_delete = None;
    }

    /// Copies the text a delete is about to remove, for the squash
    /// comparison. Returns `None` when capture is off or the delete will
    /// be a no-op.
    fn capture_delete(&mut self, index: usize, count: usize) -> Option<(usize, String)> {
        if !self.save_deletes || count == 0 || index >= self.inner.len() {
            return None;
        }
        let end = (index + count).min(self.inner.len());
        let snapshot = self.text();
        let from = byte_of(snapshot, index);
        let to = byte_of(snapshot, end);
        Some((index, snapshot[from..to].to_string()))
    }
}

impl<T: Clone> TextBuffer<T> {
    /// Inserts `text` at `index`, unless it re-inserts exactly what the
    /// immediately preceding delete removed there; that pair is squashed
    /// into an undo of the delete.
    pub fn insert(&mut self, index: usize, text: &str) {
        if self.squash(index, text) {
            return;
        }
        self.inner.insert(index, text);
        self.invalidate();
    }

    /// Payload-attaching form of [`TextBuffer::insert`]. A squashed
    /// insert drops the payload along with the cancelled delete's.
    pub fn insert_with_data(&mut self, index: usize, text: &str, data: T) {
        if self.squash(index, text) {
            return;
        }
        self.inner.insert_with_data(index, text, data);
        self.invalidate();
    }

    /// Checked form of [`TextBuffer::insert`]; see
    /// [`PieceTable::try_insert`]. A squashed insert reports `Ok`.
    pub fn try_insert(&mut self, index: usize, text: &str) -> BufferResult<()> {
        if self.squash(index, text) {
            return Ok(());
        }
        let result = self.inner.try_insert(index, text);
        if result.is_ok() {
            self.invalidate();
        }
        result
    }

    pub fn undo(&mut self) -> Vec<T> {
        self.invalidate();
        self.inner.undo()
    }

    pub fn redo(&mut self) -> Vec<T> {
        self.invalidate();
        self.inner.redo()
    }

    fn squash(&mut self, index: usize, text: &str) -> bool {
        let matches = match &self.last_delete {
            Some((at, deleted)) => *at == index && deleted == text,
            None => false,
        };
        if matches {
            let _ = self.inner.undo();
            self.invalidate();
        }
        matches
    }
}

impl<T> Default for TextBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> From<&str> for TextBuffer<T> {
    fn from(text: &str) -> Self {
        Self::from_table(PieceTable::from(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_tracks_mutations() {
        let mut b = TextBuffer::<()>::from("hello");
        assert_eq!(b.text(), "hello");
        b.insert(5, " world");
        assert_eq!(b.text(), "hello world");
        b.delete(0, 6);
        assert_eq!(b.text(), "world");
        assert_eq!(b.bytes(), b"world");
    }

    #[test]
    fn test_snapshot_memoized() {
        let mut b = TextBuffer::<()>::from("stable");
        let first = b.text().as_ptr();
        let second = b.text().as_ptr();
        assert_eq!(first, second);
    }

    #[test]
    fn test_cut_paste_squash() {
        let mut b = TextBuffer::<()>::from("abcdef");
        b.delete(2, 2); // cut "cd"
        assert_eq!(b.text(), "abef");
        b.insert(2, "cd"); // paste it right back
        assert_eq!(b.text(), "abcdef");

        // the pair cancelled out; history is empty again
        assert!(b.undo().is_empty());
        assert_eq!(b.text(), "abcdef");
    }

    #[test]
    fn test_squash_requires_same_index() {
        let mut b = TextBuffer::<()>::from("abcdef");
        b.delete(2, 2);
        b.insert(0, "cd");
        assert_eq!(b.text(), "cdabef");
        // two real edits on the stack
        b.undo();
        assert_eq!(b.text(), "abef");
        b.undo();
        assert_eq!(b.text(), "abcdef");
    }

    #[test]
    fn test_squash_requires_same_text() {
        let mut b = TextBuffer::<()>::from("abcdef");
        b.delete(2, 2);
        b.insert(2, "CD");
        assert_eq!(b.text(), "abCDef");
        b.undo();
        assert_eq!(b.text(), "abef");
    }

    #[test]
    fn test_squash_only_immediately_after_delete() {
        let mut b = TextBuffer::<()>::from("abcdef");
        b.delete(2, 2);
        b.insert(0, "x"); // intervening edit clears the capture
        b.insert(3, "cd");
        assert_eq!(b.text(), "xabcdef");
        b.undo();
        assert_eq!(b.text(), "xabef");
    }

    #[test]
    fn test_save_deletes_toggle() {
        let mut b = TextBuffer::<()>::from("abcdef");
        b.set_save_deletes(false);
        b.delete(2, 2);
        b.insert(2, "cd"); // no capture, so this is a fresh insert
        assert_eq!(b.text(), "abcdef");
        b.undo();
        assert_eq!(b.text(), "abef");

        b.set_save_deletes(true);
        b.delete(0, 2);
        b.insert(0, "ab");
        assert_eq!(b.text(), "abef");
        b.undo();
        // squash consumed the delete entry, so undo reaches the insert before it
        assert_eq!(b.text(), "abcdef");
    }

    #[test]
    fn test_squash_does_not_cross_into_transaction() {
        let mut b = TextBuffer::<()>::from("abcdef");
        b.delete(2, 2); // cut "cd"

        b.start_transaction();
        b.insert(2, "cd"); // a real insert, not a squash
        b.insert(6, "!");
        b.end_transaction();
        assert_eq!(b.text(), "abcdef!");

        // the transaction undoes as one unit, the delete separately
        b.undo();
        assert_eq!(b.text(), "abef");
        b.undo();
        assert_eq!(b.text(), "abcdef");
    }

    #[test]
    fn test_squash_does_not_cross_out_of_transaction() {
        let mut b = TextBuffer::<()>::from("abcdef");
        b.start_transaction();
        b.delete(2, 2);
        b.end_transaction();

        b.insert(2, "cd"); // a real insert
        assert_eq!(b.text(), "abcdef");
        b.undo();
        assert_eq!(b.text(), "abef");
    }

    #[test]
    fn test_checked_companions_forwarded() {
        let mut b = TextBuffer::<()>::from("abc");
        assert!(b.try_insert(10, "x").is_err());
        assert_eq!(b.text(), "abc");
        assert!(b.try_insert(3, "!").is_ok());
        assert_eq!(b.text(), "abc!");

        assert!(b.try_delete(10, 1).is_err());
        assert!(b.try_delete(3, 1).is_ok());
        assert_eq!(b.text(), "abc");

        // the checked insert still squashes against the captured delete
        assert!(b.try_insert(3, "!").is_ok());
        assert_eq!(b.text(), "abc!");
        b.undo();
        assert_eq!(b.text(), "abc");
    }

    #[test]
    fn test_forwarded_undo_surface() {
        let mut b = TextBuffer::<u32>::from("doc");
        b.insert_with_data(3, "!", 7);
        assert_eq!(b.undo(), vec![7]);
        assert_eq!(b.text(), "doc");
        assert_eq!(b.redo(), vec![7]);
        assert_eq!(b.text(), "doc!");
    }

    #[test]
    fn test_multibyte_capture() {
        let mut b = TextBuffer::<()>::from("aéz");
        b.delete(1, 1);
        assert_eq!(b.text(), "az");
        b.insert(1, "é");
        assert_eq!(b.text(), "aéz");
        assert!(b.undo().is_empty());
    }
}
