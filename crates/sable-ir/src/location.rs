use std::fmt;

/// A program point: the source coordinate a statement or expression was
/// lowered from.
///
/// Locations are the identity of allocation sites and context-sensitivity
/// tokens, so they are totally ordered and hashable. Frontends that have no
/// real coordinates use [`CodeLocation::UNKNOWN`] or synthesize increasing
/// line numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CodeLocation {
    pub line: u32,
    pub col: u32,
}

impl CodeLocation {
    pub const UNKNOWN: CodeLocation = CodeLocation { line: 0, col: 0 };

    pub const fn new(line: u32, col: u32) -> Self {
        CodeLocation { line, col }
    }

    /// Shorthand for a location at column zero, the common case in tests and
    /// single-expression statements.
    pub const fn line(line: u32) -> Self {
        CodeLocation { line, col: 0 }
    }
}

impl fmt::Display for CodeLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}
