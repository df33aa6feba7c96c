//! Source locations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Source location span with byte offsets and line/column positions.
///
/// The end position is exclusive: a token that ends with a line break ends
/// at column 1 of the following line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Start byte offset (0-indexed).
    pub start_byte: usize,
    /// End byte offset (0-indexed, exclusive).
    pub end_byte: usize,
    /// Start line (1-indexed).
    pub start_line: usize,
    /// Start column (1-indexed, in bytes).
    pub start_col: usize,
    /// End line (1-indexed).
    pub end_line: usize,
    /// End column (1-indexed, exclusive).
    pub end_col: usize,
}

impl Span {
    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.end_byte - self.start_byte
    }

    pub fn is_empty(&self) -> bool {
        self.start_byte == self.end_byte
    }

    /// A zero-length span at the start of this one.
    pub fn start_point(&self) -> Span {
        Span {
            start_byte: self.start_byte,
            end_byte: self.start_byte,
            start_line: self.start_line,
            start_col: self.start_col,
            end_line: self.start_line,
            end_col: self.start_col,
        }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn to(&self, other: &Span) -> Span {
        let first = if self.start_byte <= other.start_byte { self } else { other };
        let last = if self.end_byte >= other.end_byte { self } else { other };
        Span {
            start_byte: first.start_byte,
            end_byte: last.end_byte,
            start_line: first.start_line,
            start_col: first.start_col,
            end_line: last.end_line,
            end_col: last.end_col,
        }
    }

    /// Whether the span fits inside a file of `len` bytes.
    pub fn within(&self, len: usize) -> bool {
        self.start_byte <= self.end_byte && self.end_byte <= len
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start_line, self.start_col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(start: usize, end: usize, line: usize, col: usize, end_col: usize) -> Span {
        Span {
            start_byte: start,
            end_byte: end,
            start_line: line,
            start_col: col,
            end_line: line,
            end_col,
        }
    }

    #[test]
    fn test_span_join() {
        let a = span(0, 3, 1, 1, 4);
        let b = span(5, 8, 1, 6, 9);
        let joined = a.to(&b);
        assert_eq!(joined.start_byte, 0);
        assert_eq!(joined.end_byte, 8);
        assert_eq!(joined.start_col, 1);
        assert_eq!(joined.end_col, 9);
        assert_eq!(b.to(&a), joined);
    }

    #[test]
    fn test_span_bounds() {
        let s = span(2, 4, 1, 3, 5);
        assert!(s.within(4));
        assert!(!s.within(3));
        assert_eq!(s.len(), 2);
        assert!(s.start_point().is_empty());
        assert_eq!(s.to_string(), "1:3");
    }
}
