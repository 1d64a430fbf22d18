//! Piece descriptors and the sentinel-bounded piece list.
//!
//! ## Why an arena?
//!
//! A piece chain is naturally a pointer graph: a doubly linked list of
//! pieces, plus undo entries holding references to pieces that were
//! removed from the list but may be spliced back in later. Instead of
//! `Rc<RefCell<..>>` cycles, pieces live in a grow-only arena and are
//! addressed by [`PieceId`] handles. Removing a piece from the list only
//! rewires neighbor links; the arena entry stays put, so handles held by
//! undo/redo entries remain valid for the lifetime of the table.

use serde::{Deserialize, Serialize};

/// Identifies which backing buffer a piece slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BufferId {
    /// The read-only buffer fixed when the document is (re)loaded.
    Original,
    /// The append-only buffer that receives every inserted character.
    Add,
    /// Sentinel pieces reference no buffer.
    Invalid,
}

/// A reference to one contiguous run of text in a backing buffer.
///
/// The `start`/`byte_start` of a piece never change after creation; only
/// `len`/`byte_len` may move, when the append fast path extends the most
/// recently inserted piece or a truncation shrinks it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piece {
    /// Which buffer this piece slices.
    pub source: BufferId,
    /// Offset into the source buffer, in chars.
    pub start: usize,
    /// Length in chars.
    pub len: usize,
    /// Offset into the source buffer, in bytes.
    pub byte_start: usize,
    /// Length in bytes.
    pub byte_len: usize,
}

impl Piece {
    pub(crate) fn sentinel() -> Self {
        Self {
            source: BufferId::Invalid,
            start: 0,
            len: 0,
            byte_start: 0,
            byte_len: 0,
        }
    }
}

/// Stable handle to a piece in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PieceId(usize);

/// Head sentinel; never part of the visible document.
pub(crate) const HEAD: PieceId = PieceId(0);
/// Tail sentinel; never part of the visible document.
pub(crate) const TAIL: PieceId = PieceId(1);

const UNLINKED: PieceId = PieceId(usize::MAX);

#[derive(Debug, Clone)]
struct Node {
    piece: Piece,
    prev: PieceId,
    next: PieceId,
}

/// A contiguous run of pieces, as removed from or installed into the list
/// by one edit.
///
/// A span with `len == 0` holds no pieces; its `first`/`last` then record
/// the two live pieces bounding the gap it describes. The sentinels
/// guarantee those always exist. Live pieces are never zero-length, so
/// `len == 0` is unambiguous.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PieceSpan {
    pub first: PieceId,
    pub last: PieceId,
    /// Total char count of the pieces in the span.
    pub len: usize,
}

impl PieceSpan {
    pub(crate) fn empty(before: PieceId, after: PieceId) -> Self {
        Self {
            first: before,
            last: after,
            len: 0,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// The sentinel-bounded doubly linked piece list, backed by an arena.
///
/// Walking `head.next .. tail.prev` and concatenating each piece's
/// referenced text yields exactly the current document.
#[derive(Debug, Clone)]
pub(crate) struct PieceList {
    nodes: Vec<Node>,
}

impl PieceList {
    pub(crate) fn new() -> Self {
        let head = Node {
            piece: Piece::sentinel(),
            prev: UNLINKED,
            next: TAIL,
        };
        let tail = Node {
            piece: Piece::sentinel(),
            prev: HEAD,
            next: UNLINKED,
        };
        Self {
            nodes: vec![head, tail],
        }
    }

    /// Adds a piece to the arena, unlinked. Links are set when the piece
    /// becomes part of a span.
    pub(crate) fn alloc(&mut self, piece: Piece) -> PieceId {
        let id = PieceId(self.nodes.len());
        self.nodes.push(Node {
            piece,
            prev: UNLINKED,
            next: UNLINKED,
        });
        id
    }

    pub(crate) fn piece(&self, id: PieceId) -> &Piece {
        &self.nodes[id.0].piece
    }

    pub(crate) fn piece_mut(&mut self, id: PieceId) -> &mut Piece {
        &mut self.nodes[id.0].piece
    }

    pub(crate) fn next(&self, id: PieceId) -> PieceId {
        self.nodes[id.0].next
    }

    pub(crate) fn prev(&self, id: PieceId) -> PieceId {
        self.nodes[id.0].prev
    }

    pub(crate) fn first(&self) -> PieceId {
        self.next(HEAD)
    }

    pub(crate) fn last(&self) -> PieceId {
        self.prev(TAIL)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.first() == TAIL
    }

    /// Iterates the live pieces in document order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Piece> + '_ {
        std::iter::successors(Some(self.first()), |id| Some(self.next(*id)))
            .take_while(|id| *id != TAIL)
            .map(|id| self.piece(id))
    }

    pub(crate) fn count(&self) -> usize {
        self.iter().count()
    }

    /// Chains `ids` into a span, linking consecutive pieces to each other.
    /// The endpoints' outward links are set by [`PieceList::install`].
    pub(crate) fn make_span(&mut self, ids: &[PieceId]) -> PieceSpan {
        debug_assert!(!ids.is_empty());
        let mut len = 0;
        for pair in ids.windows(2) {
            self.nodes[pair[0].0].next = pair[1];
            self.nodes[pair[1].0].prev = pair[0];
        }
        for id in ids {
            len += self.piece(*id).len;
        }
        PieceSpan {
            first: ids[0],
            last: ids[ids.len() - 1],
            len,
        }
    }

    /// Describes the live run `first..=last` as a span.
    pub(crate) fn span_between(&self, first: PieceId, last: PieceId) -> PieceSpan {
        let mut len = 0;
        let mut id = first;
        loop {
            len += self.piece(id).len;
            if id == last {
                break;
            }
            id = self.next(id);
        }
        PieceSpan { first, last, len }
    }

    /// The live pieces bounding a span: for a non-empty span the retained
    /// neighbor links of its endpoints, for an empty span the recorded
    /// gap bounds themselves.
    pub(crate) fn neighbors(&self, span: &PieceSpan) -> (PieceId, PieceId) {
        if span.is_empty() {
            (span.first, span.last)
        } else {
            (self.prev(span.first), self.next(span.last))
        }
    }

    /// The span currently occupying the list between `prev` and `next`.
    pub(crate) fn occupant(&self, prev: PieceId, next: PieceId) -> PieceSpan {
        let first = self.next(prev);
        if first == next {
            return PieceSpan::empty(prev, next);
        }
        let last = self.prev(next);
        self.span_between(first, last)
    }

    /// Splices `span` into the list between `prev` and `next`, replacing
    /// whatever occupied that position. Pieces displaced by the splice
    /// keep their own links, which is what lets an undo entry find its
    /// way back in O(1).
    pub(crate) fn install(&mut self, prev: PieceId, next: PieceId, span: &PieceSpan) {
        if span.is_empty() {
            self.nodes[prev.0].next = next;
            self.nodes[next.0].prev = prev;
        } else {
            self.nodes[prev.0].next = span.first;
            self.nodes[span.first.0].prev = prev;
            self.nodes[next.0].prev = span.last;
            self.nodes[span.last.0].next = next;
        }
    }

    /// Removes a single live piece, joining its neighbors.
    pub(crate) fn unlink(&mut self, id: PieceId) {
        let prev = self.prev(id);
        let next = self.next(id);
        self.nodes[prev.0].next = next;
        self.nodes[next.0].prev = prev;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_piece(len: usize) -> Piece {
        Piece {
            source: BufferId::Add,
            start: 0,
            len,
            byte_start: 0,
            byte_len: len,
        }
    }

    #[test]
    fn test_empty_list() {
        let list = PieceList::new();
        assert!(list.is_empty());
        assert_eq!(list.count(), 0);
        assert_eq!(list.first(), TAIL);
        assert_eq!(list.last(), HEAD);
    }

    #[test]
    fn test_install_and_iterate() {
        let mut list = PieceList::new();
        let a = list.alloc(add_piece(3));
        let b = list.alloc(add_piece(5));
        let span = list.make_span(&[a, b]);
        assert_eq!(span.len, 8);

        list.install(HEAD, TAIL, &span);
        assert_eq!(list.count(), 2);
        assert_eq!(list.first(), a);
        assert_eq!(list.last(), b);
    }

    #[test]
    fn test_swap_preserves_displaced_links() {
        let mut list = PieceList::new();
        let a = list.alloc(add_piece(3));
        let span_a = list.make_span(&[a]);
        list.install(HEAD, TAIL, &span_a);

        let b = list.alloc(add_piece(7));
        let (prev, next) = list.neighbors(&span_a);
        let span_b = list.make_span(&[b]);
        list.install(prev, next, &span_b);

        // a is out of the list but still knows where it came from
        assert_eq!(list.prev(a), HEAD);
        assert_eq!(list.next(a), TAIL);

        // and the occupant at that position is b
        let occupant = list.occupant(HEAD, TAIL);
        assert_eq!(occupant.first, b);
        assert_eq!(occupant.last, b);
        assert_eq!(occupant.len, 7);
    }

    #[test]
    fn test_empty_span_round_trip() {
        let mut list = PieceList::new();
        let a = list.alloc(add_piece(4));
        let span = list.make_span(&[a]);
        list.install(HEAD, TAIL, &span);

        // delete a: the new span at that position is empty
        let (prev, next) = list.neighbors(&span);
        list.install(prev, next, &PieceSpan::empty(prev, next));
        assert!(list.is_empty());

        // the occupant between the gap bounds reports empty too
        let occupant = list.occupant(prev, next);
        assert!(occupant.is_empty());

        // splice a back in
        list.install(prev, next, &span);
        assert_eq!(list.count(), 1);
        assert_eq!(list.first(), a);
    }
}
