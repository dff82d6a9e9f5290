//! Symbol-table store.
//!
//! Records, per file touched by a translation unit, where externally linkable
//! symbols are defined and where they are forward-declared. Unlike the other
//! two stores the keys may name headers, so the serialised output is shared
//! between workers.

use std::collections::{BTreeMap, BTreeSet};

/// A fully qualified symbol with its begin/end source range.
///
/// Positions are (line, column), 1-based. A front-end that only knows a
/// single point reports `begin == end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolRecord {
    pub begin: (usize, usize),
    pub end: (usize, usize),
    pub symbol: String,
}

/// Per-TU store of symbol definitions and forward declarations, keyed by the
/// file the declaration is spelled in.
#[derive(Debug, Default)]
pub struct SymbolTable {
    definitions: BTreeMap<String, Vec<SymbolRecord>>,
    forward_declarations: BTreeMap<String, Vec<SymbolRecord>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_definition(
        &mut self,
        file: &str,
        begin: (usize, usize),
        end: (usize, usize),
        symbol: impl Into<String>,
    ) {
        self.definitions
            .entry(file.to_string())
            .or_default()
            .push(SymbolRecord {
                begin,
                end,
                symbol: symbol.into(),
            });
    }

    pub fn add_forward_declaration(
        &mut self,
        file: &str,
        begin: (usize, usize),
        end: (usize, usize),
        symbol: impl Into<String>,
    ) {
        self.forward_declarations
            .entry(file.to_string())
            .or_default()
            .push(SymbolRecord {
                begin,
                end,
                symbol: symbol.into(),
            });
    }

    /// The union of files appearing in either mapping.
    pub fn known_files(&self) -> BTreeSet<String> {
        self.definitions
            .keys()
            .chain(self.forward_declarations.keys())
            .cloned()
            .collect()
    }

    /// Definitions recorded for `file`, in insertion order. Empty for
    /// unknown files.
    pub fn definitions_in(&self, file: &str) -> &[SymbolRecord] {
        self.definitions.get(file).map_or(&[], Vec::as_slice)
    }

    /// Forward declarations recorded for `file`, in insertion order. Empty
    /// for unknown files.
    pub fn forward_declarations_in(&self, file: &str) -> &[SymbolRecord] {
        self.forward_declarations.get(file).map_or(&[], Vec::as_slice)
    }
}
