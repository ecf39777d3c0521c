/// Source locations inside a synthesized compilation unit.
///
/// Diagnostics and runtime faults point back into the unit text through
/// these, so a failing method body can be traced to the line the model
/// generated.
use std::fmt;

/// A single position in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pos {
    /// Byte offset from the start of the input (0-based).
    pub offset: usize,
    /// Line number (1-based).
    pub line: usize,
    /// Column number (1-based, in characters).
    pub column: usize,
}

impl Pos {
    pub const fn new(offset: usize, line: usize, column: usize) -> Self {
        Self {
            offset,
            line,
            column,
        }
    }

    pub const fn origin() -> Self {
        Self::new(0, 1, 1)
    }

    /// Position after consuming `ch`.
    pub fn advance(self, ch: char) -> Self {
        if ch == '\n' {
            Self::new(self.offset + ch.len_utf8(), self.line + 1, 1)
        } else {
            Self::new(self.offset + ch.len_utf8(), self.line, self.column + 1)
        }
    }

    /// Translate a position that was computed relative to a fragment
    /// starting at `base` into the coordinates of the enclosing text.
    pub fn rebase(self, base: Pos) -> Self {
        let column = if self.line == 1 {
            base.column + self.column - 1
        } else {
            self.column
        };
        Self::new(base.offset + self.offset, base.line + self.line - 1, column)
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A contiguous region of source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: Pos,
    pub end: Pos,
}

impl Span {
    pub const fn new(start: Pos, end: Pos) -> Self {
        Self { start, end }
    }

    pub const fn point(pos: Pos) -> Self {
        Self::new(pos, pos)
    }

    /// Smallest span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        let start = if self.start.offset <= other.start.offset {
            self.start
        } else {
            other.start
        };
        let end = if self.end.offset >= other.end.offset {
            self.end
        } else {
            other.end
        };
        Span::new(start, end)
    }

    pub fn rebase(self, base: Pos) -> Span {
        Span::new(self.start.rebase(base), self.end.rebase(base))
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.start.line, self.start.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_tracks_lines() {
        let mut pos = Pos::origin();
        for ch in "ab\nc".chars() {
            pos = pos.advance(ch);
        }
        assert_eq!(pos, Pos::new(4, 2, 2));
    }

    #[test]
    fn rebase_first_line_shifts_column() {
        let base = Pos::new(10, 3, 7);
        assert_eq!(Pos::new(2, 1, 3).rebase(base), Pos::new(12, 3, 9));
        assert_eq!(Pos::new(5, 2, 1).rebase(base), Pos::new(15, 4, 1));
    }

    #[test]
    fn to_covers_both() {
        let a = Span::new(Pos::new(4, 1, 5), Pos::new(6, 1, 7));
        let b = Span::new(Pos::new(1, 1, 2), Pos::new(3, 1, 4));
        let merged = a.to(b);
        assert_eq!(merged.start.offset, 1);
        assert_eq!(merged.end.offset, 6);
    }
}
