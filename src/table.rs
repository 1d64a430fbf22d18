//! The piece-table core engine.
//!
//! ## Why a piece chain?
//!
//! The document is never stored as one contiguous string. It is the
//! concatenation of *pieces*, each referencing a slice of one of two
//! backing buffers: the read-only `original` buffer fixed at load time,
//! and the append-only `add` buffer that receives every character ever
//! typed. Editing rewires the piece list instead of moving text, which
//! makes every edit cheap and makes undo a matter of swapping a run of
//! pieces back into the position it came from.
//!
//! ## Undo model
//!
//! Every successful edit pushes one [`PieceRange`] onto the undo stack:
//! the run of pieces the edit removed from the list, the caller's opaque
//! payloads, and a snapshot of the saved-state flag. Because a splice
//! never touches the links *inside* a removed run, an undo entry can
//! locate the pieces currently occupying its old position through its
//! endpoints' retained neighbor links, in O(1).
//!
//! ## Concurrency
//!
//! Single writer, no internal locking. `PieceTable` is `Send` but not
//! shared; background consumers must take a flattened snapshot via
//! [`PieceTable::bytes`] before crossing a thread boundary.

use crate::piece::{BufferId, Piece, PieceId, PieceList, PieceSpan, HEAD, TAIL};
use crate::{BufferError, BufferResult};

/// One undoable edit: the pieces it displaced, the caller's payloads,
/// and the flags undo/redo need to replay it.
#[derive(Debug, Clone)]
struct PieceRange<T> {
    span: PieceSpan,
    /// Caller-supplied undo data, in the order it was attached.
    data: Vec<T>,
    /// Whether the document was marked immediately before this edit.
    marked: bool,
    /// Set on every transaction edit after the first; tells undo/redo to
    /// keep stepping so the whole transaction reverses as one unit.
    merge_undo: bool,
}

/// Append fast-path cache: the piece the most recent insert created and
/// the document index just past it.
#[derive(Debug, Clone, Copy)]
struct LastInsert {
    piece: PieceId,
    end_index: usize,
}

/// Where an insertion index lands in the piece list.
enum InsertPoint {
    /// The list is empty.
    Empty,
    /// Before the first char of this piece (index 0 only).
    Start(PieceId),
    /// Strictly inside this piece, at the given char offset.
    Inside(PieceId, usize),
    /// Just past the last char of this piece.
    End(PieceId),
}

/// A mutable text document backed by a piece chain, with transactional
/// undo/redo and a saved-state mark.
///
/// `T` is an opaque per-edit payload the table stores and returns
/// verbatim from [`PieceTable::undo`]/[`PieceTable::redo`]; editors use
/// it to carry cursor-restore state without the table knowing anything
/// about cursors.
///
/// Indices and lengths are char (rune) counts. Out-of-range indices make
/// the primary mutators silent no-ops; use [`PieceTable::try_insert`] and
/// [`PieceTable::try_delete`] to surface them instead.
#[derive(Debug, Clone)]
pub struct PieceTable<T = ()> {
    original: String,
    add: String,
    /// Char count of `add`, so new pieces get their char offset in O(1).
    add_chars: usize,
    list: PieceList,
    /// Sum of live piece lengths, in chars.
    length: usize,
    undo_stack: Vec<PieceRange<T>>,
    redo_stack: Vec<PieceRange<T>>,
    marked: bool,
    in_transaction: bool,
    transaction_has_edit: bool,
    last_insert: Option<LastInsert>,
}

impl<T> PieceTable<T> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            original: String::new(),
            add: String::new(),
            add_chars: 0,
            list: PieceList::new(),
            length: 0,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            marked: false,
            in_transaction: false,
            transaction_has_edit: false,
            last_insert: None,
        }
    }

    // ==================== Loading ====================

    /// Replaces the entire document, resetting both buffers, the piece
    /// list and all history. Used for the initial load; not undoable.
    pub fn set(&mut self, text: &str) {
        self.original.clear();
        self.original.push_str(text);
        self.add.clear();
        self.add_chars = 0;
        self.list = PieceList::new();
        self.length = text.chars().count();
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.marked = false;
        self.in_transaction = false;
        self.transaction_has_edit = false;
        self.last_insert = None;

        if !text.is_empty() {
            let piece = Piece {
                source: BufferId::Original,
                start: 0,
                len: self.length,
                byte_start: 0,
                byte_len: text.len(),
            };
            let id = self.list.alloc(piece);
            let span = self.list.make_span(&[id]);
            self.list.install(HEAD, TAIL, &span);
        }
        tracing::debug!(chars = self.length, "set document");
    }

    /// Byte-slice form of [`PieceTable::set`]. Invalid UTF-8 is replaced,
    /// since the table indexes by char.
    pub fn set_bytes(&mut self, bytes: &[u8]) {
        let text = String::from_utf8_lossy(bytes);
        self.set(&text);
    }

    /// Replaces the entire document as a single undoable edit: the whole
    /// current piece range goes onto the undo stack and one new piece
    /// over the freshly appended `add` bytes takes its place. This is how
    /// "reload from disk" stays undoable.
    pub fn set_with_undo(&mut self, text: &str) {
        let old = if self.list.is_empty() {
            PieceSpan::empty(HEAD, TAIL)
        } else {
            self.list.span_between(self.list.first(), self.list.last())
        };

        let chars = text.chars().count();
        let new = if text.is_empty() {
            PieceSpan::empty(HEAD, TAIL)
        } else {
            let id = self.append_to_add(text, chars);
            self.list.make_span(&[id])
        };

        self.list.install(HEAD, TAIL, &new);
        self.push_edit(old, None);
        self.length = chars;
        self.last_insert = None;
        tracing::debug!(chars, "set document (undoable)");
    }

    /// Byte-slice form of [`PieceTable::set_with_undo`].
    pub fn set_bytes_with_undo(&mut self, bytes: &[u8]) {
        let text = String::from_utf8_lossy(bytes);
        self.set_with_undo(&text);
    }

    // ==================== Editing ====================

    /// Inserts `text` before the char at `index`. A no-op when `index`
    /// exceeds the document length.
    pub fn insert(&mut self, index: usize, text: &str) {
        let _ = self.insert_impl(index, text, None);
    }

    /// Like [`PieceTable::insert`], attaching an opaque payload that
    /// [`PieceTable::undo`] will hand back when this edit is undone.
    pub fn insert_with_data(&mut self, index: usize, text: &str, data: T) {
        let _ = self.insert_impl(index, text, Some(data));
    }

    /// Checked insert: reports an out-of-range `index` instead of
    /// ignoring it.
    pub fn try_insert(&mut self, index: usize, text: &str) -> BufferResult<()> {
        self.insert_impl(index, text, None)
    }

    /// Deletes `count` chars starting at `index`. A no-op when `index`
    /// is past the end; a `count` overrunning the end is clamped.
    pub fn delete(&mut self, index: usize, count: usize) {
        let _ = self.delete_impl(index, count, None);
    }

    /// Like [`PieceTable::delete`], attaching an opaque payload for undo.
    pub fn delete_with_data(&mut self, index: usize, count: usize, data: T) {
        let _ = self.delete_impl(index, count, Some(data));
    }

    /// Checked delete: reports an out-of-range `index` instead of
    /// ignoring it.
    pub fn try_delete(&mut self, index: usize, count: usize) -> BufferResult<()> {
        self.delete_impl(index, count, None)
    }

    /// Inserts at the end of the document.
    pub fn append(&mut self, text: &str) {
        let end = self.length;
        self.insert(end, text);
    }

    /// Shrinks the most recently inserted piece by `count` chars from its
    /// end, clamped to the piece's length. Used to cancel part of an
    /// in-progress auto-insertion (e.g. a matching bracket).
    pub fn truncate_last_insert(&mut self, count: usize) {
        let Some(cache) = self.last_insert else {
            return;
        };
        if count == 0 {
            return;
        }

        let piece = *self.list.piece(cache.piece);
        let keep = piece.len.saturating_sub(count);
        let cut = piece.len - keep;
        let keep_bytes = self.byte_offset_in(&piece, keep);

        if keep == 0 {
            // live pieces are never zero-length
            self.list.unlink(cache.piece);
            self.last_insert = None;
        } else {
            let p = self.list.piece_mut(cache.piece);
            p.len = keep;
            p.byte_len = keep_bytes;
            self.last_insert = Some(LastInsert {
                piece: cache.piece,
                end_index: cache.end_index - cut,
            });
        }

        // reclaim the bytes when the piece sits at the tail of the add buffer
        if piece.byte_start + piece.byte_len == self.add.len() {
            self.add.truncate(piece.byte_start + keep_bytes);
            self.add_chars -= cut;
        }
        self.length -= cut;
    }

    // ==================== Transactions ====================

    /// Starts grouping edits: every following edit except the first is
    /// flagged so one undo/redo steps through the whole group.
    pub fn start_transaction(&mut self) {
        self.in_transaction = true;
        self.transaction_has_edit = false;
        // the group must not coalesce into a pre-transaction entry
        self.last_insert = None;
    }

    /// Stops grouping edits. The append fast path stays disabled for the
    /// next insert so the group's final state is never silently merged
    /// into the following keystroke's undo entry.
    pub fn end_transaction(&mut self) {
        self.in_transaction = false;
        self.transaction_has_edit = false;
        self.last_insert = None;
    }

    // ==================== Saved state ====================

    /// Marks the current content as saved. Entries already on the
    /// undo/redo stacks lose their marked snapshot: only the live state
    /// can be the saved one.
    pub fn mark(&mut self) {
        self.marked = true;
        for entry in self
            .undo_stack
            .iter_mut()
            .chain(self.redo_stack.iter_mut())
        {
            entry.marked = false;
        }
        // typing after a save starts a fresh undo entry
        self.last_insert = None;
    }

    /// Whether the current content matches the last [`PieceTable::mark`].
    pub fn is_marked(&self) -> bool {
        self.marked
    }

    // ==================== Reading ====================

    /// Document length in chars.
    pub fn len(&self) -> usize {
        self.length
    }

    /// Whether the document is empty.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Number of live pieces. Stays O(1) while typing thanks to the
    /// append fast path.
    pub fn piece_count(&self) -> usize {
        self.list.count()
    }

    /// Flattens the document into one owned string, walking the piece
    /// list once.
    pub fn text(&self) -> String {
        let bytes: usize = self.list.iter().map(|p| p.byte_len).sum();
        let mut out = String::with_capacity(bytes);
        for piece in self.list.iter() {
            out.push_str(self.slice_of(piece));
        }
        out
    }

    /// Flattened document bytes. Always valid UTF-8.
    pub fn bytes(&self) -> Vec<u8> {
        self.text().into_bytes()
    }

    // ==================== Undo / redo ====================

    fn unwind(&mut self, undo: bool) -> Vec<T>
    where
        T: Clone,
    {
        let mut out = Vec::new();
        let mut first_step = true;
        loop {
            let range = match if undo {
                self.undo_stack.pop()
            } else {
                self.redo_stack.pop()
            } {
                Some(range) => range,
                None => break,
            };
            let merge = range.merge_undo;
            out.extend(range.data.iter().cloned());

            let (prev, next) = self.list.neighbors(&range.span);
            let displaced_span = self.list.occupant(prev, next);
            self.list.install(prev, next, &range.span);
            self.length = self.length + range.span.len - displaced_span.len;

            // the payloads migrate with the position so the opposite
            // direction returns them again
            let displaced = PieceRange {
                span: displaced_span,
                data: range.data,
                marked: self.marked,
                merge_undo: !first_step,
            };
            self.marked = range.marked;
            if undo {
                self.redo_stack.push(displaced);
            } else {
                self.undo_stack.push(displaced);
            }

            first_step = false;
            if !merge {
                break;
            }
        }
        self.last_insert = None;
        out
    }

    /// Reverses the most recent edit, or the whole transaction it belongs
    /// to, and returns the attached payloads: newest edit's payloads
    /// first, each edit's own payloads in the order they were attached.
    /// A no-op returning an empty vec when there is nothing to undo.
    pub fn undo(&mut self) -> Vec<T>
    where
        T: Clone,
    {
        tracing::debug!(depth = self.undo_stack.len(), "undo");
        self.unwind(true)
    }

    /// Re-applies the most recently undone edit or transaction. Payload
    /// semantics mirror [`PieceTable::undo`].
    pub fn redo(&mut self) -> Vec<T>
    where
        T: Clone,
    {
        tracing::debug!(depth = self.redo_stack.len(), "redo");
        self.unwind(false)
    }

    // ==================== Internals ====================

    fn slice_of(&self, piece: &Piece) -> &str {
        let buf = match piece.source {
            BufferId::Original => self.original.as_str(),
            BufferId::Add => self.add.as_str(),
            BufferId::Invalid => return "",
        };
        &buf[piece.byte_start..piece.byte_start + piece.byte_len]
    }

    /// Byte offset of char `char_off` within a piece's slice.
    fn byte_offset_in(&self, piece: &Piece, char_off: usize) -> usize {
        let slice = self.slice_of(piece);
        slice
            .char_indices()
            .nth(char_off)
            .map(|(byte, _)| byte)
            .unwrap_or(slice.len())
    }

    /// Appends `text` to the add buffer and allocates a piece over it.
    fn append_to_add(&mut self, text: &str, chars: usize) -> PieceId {
        let piece = Piece {
            source: BufferId::Add,
            start: self.add_chars,
            len: chars,
            byte_start: self.add.len(),
            byte_len: text.len(),
        };
        self.add.push_str(text);
        self.add_chars += chars;
        self.list.alloc(piece)
    }

    /// The merge flag for the next undo entry: set while inside a
    /// transaction, except for the transaction's first edit, so undoing
    /// stops exactly before the transaction began.
    fn next_merge_flag(&mut self) -> bool {
        if self.in_transaction {
            if self.transaction_has_edit {
                true
            } else {
                self.transaction_has_edit = true;
                false
            }
        } else {
            false
        }
    }

    fn push_edit(&mut self, old: PieceSpan, data: Option<T>) {
        let merge_undo = self.next_merge_flag();
        self.undo_stack.push(PieceRange {
            span: old,
            data: data.into_iter().collect(),
            marked: self.marked,
            merge_undo,
        });
        self.redo_stack.clear();
        self.marked = false;
    }

    /// Linear scan for the piece containing an insertion index. Boundary
    /// indices resolve to the *end* of the preceding piece, which is the
    /// case the append fast path extends.
    fn find_insert_point(&self, index: usize) -> InsertPoint {
        if self.list.is_empty() {
            return InsertPoint::Empty;
        }
        if index == 0 {
            return InsertPoint::Start(self.list.first());
        }
        let mut pos = 0;
        let mut id = self.list.first();
        while id != TAIL {
            let len = self.list.piece(id).len;
            if index <= pos + len {
                let off = index - pos;
                return if off == len {
                    InsertPoint::End(id)
                } else {
                    InsertPoint::Inside(id, off)
                };
            }
            pos += len;
            id = self.list.next(id);
        }
        // callers validate index <= length first
        InsertPoint::Empty
    }

    fn insert_impl(&mut self, index: usize, text: &str, data: Option<T>) -> BufferResult<()> {
        if text.is_empty() {
            return Ok(());
        }
        if index > self.length {
            return Err(BufferError::IndexOutOfBounds {
                index,
                len: self.length,
            });
        }

        let chars = text.chars().count();

        // Fast path: a run of inserts at the growing end of the piece the
        // previous insert created extends that piece in place, so typing
        // does not cost one piece and one undo entry per keystroke.
        if let Some(cache) = self.last_insert {
            let piece = *self.list.piece(cache.piece);
            let at_add_tail = piece.source == BufferId::Add
                && piece.byte_start + piece.byte_len == self.add.len();
            if cache.end_index == index && at_add_tail {
                self.add.push_str(text);
                self.add_chars += chars;
                {
                    let p = self.list.piece_mut(cache.piece);
                    p.len += chars;
                    p.byte_len += text.len();
                }
                self.length += chars;
                self.last_insert = Some(LastInsert {
                    piece: cache.piece,
                    end_index: index + chars,
                });
                if let Some(payload) = data {
                    if let Some(entry) = self.undo_stack.last_mut() {
                        entry.data.push(payload);
                    }
                }
                self.redo_stack.clear();
                self.marked = false;
                tracing::trace!(index, chars, "insert (extend)");
                return Ok(());
            }
        }

        let point = self.find_insert_point(index);
        let new_id = self.append_to_add(text, chars);

        let (old, new) = match point {
            InsertPoint::Empty => (
                PieceSpan::empty(HEAD, TAIL),
                self.list.make_span(&[new_id]),
            ),
            InsertPoint::Start(id) => {
                let copy = self.list.alloc(*self.list.piece(id));
                (
                    self.list.span_between(id, id),
                    self.list.make_span(&[new_id, copy]),
                )
            }
            InsertPoint::End(id) => {
                let copy = self.list.alloc(*self.list.piece(id));
                (
                    self.list.span_between(id, id),
                    self.list.make_span(&[copy, new_id]),
                )
            }
            InsertPoint::Inside(id, off) => {
                let piece = *self.list.piece(id);
                let split = self.byte_offset_in(&piece, off);
                let pre = self.list.alloc(Piece {
                    source: piece.source,
                    start: piece.start,
                    len: off,
                    byte_start: piece.byte_start,
                    byte_len: split,
                });
                let post = self.list.alloc(Piece {
                    source: piece.source,
                    start: piece.start + off,
                    len: piece.len - off,
                    byte_start: piece.byte_start + split,
                    byte_len: piece.byte_len - split,
                });
                (
                    self.list.span_between(id, id),
                    self.list.make_span(&[pre, new_id, post]),
                )
            }
        };

        let (prev, next) = self.list.neighbors(&old);
        self.list.install(prev, next, &new);
        self.push_edit(old, data);
        self.length += chars;
        self.last_insert = Some(LastInsert {
            piece: new_id,
            end_index: index + chars,
        });
        tracing::trace!(index, chars, "insert");
        Ok(())
    }

    fn delete_impl(&mut self, index: usize, count: usize, data: Option<T>) -> BufferResult<()> {
        if count == 0 {
            return Ok(());
        }
        if index >= self.length {
            return Err(BufferError::RangeOutOfBounds {
                index,
                count,
                len: self.length,
            });
        }
        let count = count.min(self.length - index);

        // locate the first piece touched by the deletion
        let mut pos = 0;
        let mut start_piece = self.list.first();
        loop {
            let len = self.list.piece(start_piece).len;
            if index < pos + len {
                break;
            }
            pos += len;
            start_piece = self.list.next(start_piece);
        }
        let start_off = index - pos;

        // and the last
        let mut remaining = start_off + count;
        let mut end_piece = start_piece;
        loop {
            let len = self.list.piece(end_piece).len;
            if remaining <= len {
                break;
            }
            remaining -= len;
            end_piece = self.list.next(end_piece);
        }
        let end_off = remaining;

        // whatever survives on either side of the deleted run becomes the
        // replacement span: two boundary pieces, one, or none
        let mut replacement: Vec<PieceId> = Vec::with_capacity(2);
        if start_off > 0 {
            let piece = *self.list.piece(start_piece);
            let split = self.byte_offset_in(&piece, start_off);
            replacement.push(self.list.alloc(Piece {
                source: piece.source,
                start: piece.start,
                len: start_off,
                byte_start: piece.byte_start,
                byte_len: split,
            }));
        }
        let tail_piece = *self.list.piece(end_piece);
        if end_off < tail_piece.len {
            let split = self.byte_offset_in(&tail_piece, end_off);
            replacement.push(self.list.alloc(Piece {
                source: tail_piece.source,
                start: tail_piece.start + end_off,
                len: tail_piece.len - end_off,
                byte_start: tail_piece.byte_start + split,
                byte_len: tail_piece.byte_len - split,
            }));
        }

        let old = self.list.span_between(start_piece, end_piece);
        let (prev, next) = self.list.neighbors(&old);
        let new = if replacement.is_empty() {
            PieceSpan::empty(prev, next)
        } else {
            self.list.make_span(&replacement)
        };

        self.list.install(prev, next, &new);
        self.push_edit(old, data);
        self.length -= count;
        // the piece the fast path would extend may just have been removed
        self.last_insert = None;
        tracing::trace!(index, count, "delete");
        Ok(())
    }
}

impl<T> Default for PieceTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> From<&str> for PieceTable<T> {
    fn from(text: &str) -> Self {
        let mut table = Self::new();
        table.set(text);
        table
    }
}
