//! Tracked intervals and the position-shift algorithm.
//!
//! Cursors, selections, highlight ranges and bookmarks all live outside
//! the table as half-open char intervals. After every edit their owners
//! pass the edit's position and signed length through
//! [`Span::shifted`], which is the single function that keeps every
//! position-based piece of editor state consistent with the buffer.
//!
//! Intervals overlapping a deletion are *eroded*: shrunk to exclude the
//! removed text, instead of merely shifted past it. An interval fully
//! consumed by a deletion collapses to a cursor at the deletion point.

use serde::{Deserialize, Serialize};

/// Controls whether an edit landing exactly on one of a span's bounds
/// counts as inside the span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Boundary {
    /// Boundary edits belong to the span: an insertion at either bound
    /// grows the span. Used for selections and highlight ranges.
    Inclusive,
    /// Boundary edits fall outside the span: an insertion at `start`
    /// pushes the whole span right, one at `end` leaves it alone. Used
    /// for cursors and bookmarks.
    #[default]
    Exclusive,
}

/// A half-open interval `[start, end)` of char offsets, owned by editor
/// state outside the table.
///
/// A span with `start == end` is a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    /// Start offset (inclusive).
    pub start: usize,
    /// End offset (exclusive).
    pub end: usize,
}

impl Span {
    /// Creates a span, normalizing so `start <= end`.
    pub fn new(start: usize, end: usize) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// A zero-width span at `at`.
    pub fn cursor(at: usize) -> Self {
        Self { start: at, end: at }
    }

    /// Char count covered by the span.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the span is zero-width.
    pub fn is_cursor(&self) -> bool {
        self.start == self.end
    }

    /// Whether an offset lies inside the span.
    pub fn contains(&self, at: usize) -> bool {
        at >= self.start && at < self.end
    }

    /// Whether two spans overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Recomputes the span after an edit of signed length `delta` (chars
    /// inserted if positive, deleted if negative) at offset `at`.
    ///
    /// Spans entirely before the edit are unchanged. Deletions
    /// overlapping the span erode it. Otherwise the span shifts or grows
    /// depending on which side of the edit it sits, with `boundary`
    /// deciding the exact-boundary cases.
    #[must_use]
    pub fn shifted(self, at: usize, delta: isize, boundary: Boundary) -> Span {
        let Span { start, end } = self;

        // entirely before the change
        if end < at {
            return self;
        }
        if end == at {
            if delta > 0 && boundary == Boundary::Inclusive {
                return Span {
                    start,
                    end: end + delta as usize,
                };
            }
            return self;
        }

        if delta < 0 {
            let removed = delta.unsigned_abs();
            let deleted_end = at + removed;
            if deleted_end > start {
                // the deleted run overlaps the span: erode
                return if at <= start {
                    if deleted_end >= end {
                        Span::cursor(at)
                    } else {
                        Span {
                            start: at,
                            end: end - removed,
                        }
                    }
                } else if deleted_end >= end {
                    Span { start, end: at }
                } else {
                    Span {
                        start,
                        end: end - removed,
                    }
                };
            }
            // deletion entirely before the span
            return Span {
                start: start - removed,
                end: end - removed,
            };
        }

        let added = delta as usize;
        let start_shifts = match boundary {
            Boundary::Exclusive => at <= start,
            Boundary::Inclusive => at < start,
        };
        if start_shifts {
            Span {
                start: start + added,
                end: end + added,
            }
        } else {
            // change point strictly inside: only the end moves
            Span {
                start,
                end: end + added,
            }
        }
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

impl From<std::ops::Range<usize>> for Span {
    fn from(range: std::ops::Range<usize>) -> Self {
        Span::new(range.start, range.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization() {
        let span = Span::new(9, 4);
        assert_eq!(span, Span::new(4, 9));
        assert_eq!(span.len(), 5);
    }

    #[test]
    fn test_contains_half_open() {
        let span = Span::new(3, 7);
        assert!(span.contains(3));
        assert!(span.contains(6));
        assert!(!span.contains(7));
        assert!(!span.is_cursor());
        assert!(Span::cursor(5).is_cursor());
    }

    #[test]
    fn test_unaffected_before_change() {
        let span = Span::new(2, 5);
        assert_eq!(span.shifted(8, 3, Boundary::Exclusive), span);
        assert_eq!(span.shifted(8, -2, Boundary::Exclusive), span);
        assert_eq!(span.shifted(5, 3, Boundary::Exclusive), span);
    }

    #[test]
    fn test_insertion_shifts_or_grows() {
        let span = Span::new(10, 14);
        // before the span: both bounds shift
        assert_eq!(span.shifted(4, 3, Boundary::Exclusive), Span::new(13, 17));
        // strictly inside: the span grows
        assert_eq!(span.shifted(12, 3, Boundary::Exclusive), Span::new(10, 17));
    }

    #[test]
    fn test_insertion_at_start_boundary() {
        let span = Span::new(10, 14);
        // outside the span: pushed right
        assert_eq!(span.shifted(10, 2, Boundary::Exclusive), Span::new(12, 16));
        // inside the span: it grows
        assert_eq!(span.shifted(10, 2, Boundary::Inclusive), Span::new(10, 16));
    }

    #[test]
    fn test_insertion_at_end_boundary() {
        let span = Span::new(10, 14);
        assert_eq!(span.shifted(14, 2, Boundary::Exclusive), span);
        assert_eq!(span.shifted(14, 2, Boundary::Inclusive), Span::new(10, 16));
    }

    #[test]
    fn test_cursor_shift() {
        let cursor = Span::cursor(6);
        assert_eq!(cursor.shifted(2, 4, Boundary::Exclusive), Span::cursor(10));
        assert_eq!(cursor.shifted(2, -2, Boundary::Exclusive), Span::cursor(4));
    }

    #[test]
    fn test_deletion_before_shifts_left() {
        let span = Span::new(10, 14);
        assert_eq!(span.shifted(2, -3, Boundary::Exclusive), Span::new(7, 11));
        // deletion ending exactly at start does not erode
        assert_eq!(span.shifted(7, -3, Boundary::Exclusive), Span::new(7, 11));
    }

    #[test]
    fn test_erosion_inside() {
        // the documented example: [20, 25), delete 2 at 22 => [20, 23)
        let span = Span::new(20, 25);
        assert_eq!(span.shifted(22, -2, Boundary::Exclusive), Span::new(20, 23));
    }

    #[test]
    fn test_erosion_of_tail() {
        let span = Span::new(20, 25);
        assert_eq!(span.shifted(23, -4, Boundary::Exclusive), Span::new(20, 23));
    }

    #[test]
    fn test_erosion_of_head() {
        let span = Span::new(20, 25);
        assert_eq!(span.shifted(18, -4, Boundary::Exclusive), Span::new(18, 21));
    }

    #[test]
    fn test_erosion_full_consumption() {
        let span = Span::new(20, 25);
        assert_eq!(span.shifted(19, -8, Boundary::Exclusive), Span::cursor(19));
        assert_eq!(span.shifted(20, -5, Boundary::Exclusive), Span::cursor(20));
    }

    #[test]
    fn test_every_owner_uses_the_same_function() {
        // a cursor, a selection and a bookmark all tracking one edit
        let edit = (5, -3);
        let cursor = Span::cursor(12).shifted(edit.0, edit.1, Boundary::Exclusive);
        let selection = Span::new(4, 12).shifted(edit.0, edit.1, Boundary::Inclusive);
        let bookmark = Span::cursor(6).shifted(edit.0, edit.1, Boundary::Exclusive);
        assert_eq!(cursor, Span::cursor(9));
        assert_eq!(selection, Span::new(4, 9));
        assert_eq!(bookmark, Span::cursor(5));
    }
}
