// source.rs — Source file identity and byte-offset to line/column mapping
//
// Preconditions: `text` is the exact string the lexer consumed.
// Postconditions: `location()` maps any offset in `0..=text.len()` to a
//   1-based line and column.
// Failure modes: none; offsets past the end clamp to the last position.
// Side effects: none.

use std::fmt;

use serde::Serialize;

use crate::ast::Span;

/// A resolved source position, rendered `file:line:col`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub file: String,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// A named source text with a precomputed line index.
#[derive(Debug, Clone)]
pub struct SourceFile {
    name: String,
    len: usize,
    /// Byte offset of the first character of each line.
    line_starts: Vec<usize>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, text: &str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        SourceFile {
            name: name.into(),
            len: text.len(),
            line_starts,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Location of a byte offset. Columns count bytes, like C compilers do.
    pub fn location(&self, offset: usize) -> Location {
        let offset = offset.min(self.len);
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        Location {
            file: self.name.clone(),
            line: line + 1,
            column: offset - self.line_starts[line] + 1,
        }
    }

    /// Location of the start of a span.
    pub fn span_location(&self, span: Span) -> Location {
        self.location(span.start)
    }
}
