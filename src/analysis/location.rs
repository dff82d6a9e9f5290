//! Source-location model.

use std::fmt;

/// A normalised source position: file path plus 1-based line and column.
///
/// Ordering is lexicographic by (file, line, column), which makes location
/// keys iterate in source order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceLocation {
    /// File path as reported by the front-end.
    pub file: String,
    /// Line number (1-based).
    pub line: usize,
    /// Column number (1-based, bytes).
    pub col: usize,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: usize, col: usize) -> Self {
        Self {
            file: file.into(),
            line,
            col,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.col)
    }
}

/// A spelling location as reported by the front-end: the post-macro-expansion
/// origin of a token, plus the system-code flags the front-end knows about.
///
/// An *invalid* location is modelled as the absence of a `SpellingLocation`
/// (`Option::None`), so every value of this type is a real position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpellingLocation {
    pub file: String,
    pub line: usize,
    pub col: usize,
    /// The location lies inside a system header.
    pub in_system_header: bool,
    /// The location was produced by a macro defined in system code.
    pub in_system_macro: bool,
}

impl SpellingLocation {
    /// A location in ordinary user code.
    pub fn user(file: impl Into<String>, line: usize, col: usize) -> Self {
        Self {
            file: file.into(),
            line,
            col,
            in_system_header: false,
            in_system_macro: false,
        }
    }

    /// True when the location lies in a system header or system macro.
    pub fn in_system_code(&self) -> bool {
        self.in_system_header || self.in_system_macro
    }

    /// Strip the flags down to the plain position.
    pub fn position(&self) -> SourceLocation {
        SourceLocation::new(self.file.clone(), self.line, self.col)
    }
}
