use miette::SourceSpan;
use std::fmt;

/// A point in the source. Lines and columns are 1-indexed, `offset` is a byte offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Location {
    pub line: usize,
    pub column: isize,
    pub offset: usize,
}

impl Location {
    pub fn new(line: usize, column: isize, offset: usize) -> Self {
        Self {
            line,
            column,
            offset,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Position {
    pub start: Location,
    pub end: Location,
}

impl Position {
    pub fn new(start: Location, end: Location) -> Self {
        Self { start, end }
    }

    /// Spans from the start of `self` to the end of `other`.
    pub fn to(self, other: Position) -> Position {
        Position {
            start: self.start,
            end: other.end,
        }
    }

    pub fn len(&self) -> usize {
        self.end.offset.saturating_sub(self.start.offset)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_source_span(&self) -> SourceSpan {
        (self.start.offset, self.len()).into()
    }
}

/// A value that remembers where it came from, so diagnostics can point at it.
#[derive(Clone, Debug, PartialEq)]
pub struct LeafNode<T> {
    pub value: T,
    pub position: Position,
}

impl<T> LeafNode<T> {
    pub fn new(value: T, position: Position) -> Self {
        Self { value, position }
    }
}

impl LeafNode<String> {
    pub fn as_str(&self) -> &str {
        &self.value
    }
}
