//! Source positions attached to AST nodes.
//!
//! The external parser annotates every statement and expression with the
//! `(line, column)` it came from; errors and warnings carry these spans so
//! diagnostics point at the offending source text.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A source position, 1-based line and column as delivered by the parser.
///
/// The file name is not stored per node; the CLI knows which file it fed
/// to the parser and prefixes diagnostics accordingly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub line: u32,
    pub col: u32,
}

impl Span {
    pub fn new(line: u32, col: u32) -> Self {
        Span { line, col }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}
