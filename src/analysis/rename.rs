//! Rename directive store.
//!
//! Collects, for one translation unit, the set of TU-local declarations that
//! must be renamed before the TU can be merged with others, together with
//! every textual position at which the old name appears.

use std::collections::{BTreeMap, HashMap};

use colored::*;

use crate::analysis::SourceLocation;
use crate::parser::DeclId;

/// An (original name, rewritten name) pair.
pub type ReplacementPair = (String, String);

/// One textual occurrence of a renameable name, tied to the declaration it
/// resolves to. Deduplication happens when the usages are joined with the
/// bindings, not at insertion.
#[derive(Debug, Clone)]
struct Usage {
    location: SourceLocation,
    name: String,
    binding: DeclId,
}

/// Derive the rewrite prefix from a translation unit's file stem.
///
/// A leading decimal digit gets `_` prepended and every `-` or `.` becomes
/// `_`, so the prefix is always a valid identifier fragment. Deterministic:
/// depends only on the input.
pub fn rewrite_prefix(stem: &str) -> String {
    let mut prefix = String::with_capacity(stem.len() + 1);
    if stem.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        eprintln!(
            "{} filename '{}' starts with a digit, prefixing...",
            "WARN:".yellow(),
            stem
        );
        prefix.push('_');
    }
    for c in stem.chars() {
        if c == '-' || c == '.' {
            eprintln!(
                "{} identifier-invalid character '{}' in '{}', replacing with '_'",
                "WARN:".yellow(),
                c,
                stem
            );
            prefix.push('_');
        } else {
            prefix.push(c);
        }
    }
    prefix
}

/// Per-TU store of rename bindings and usage positions.
#[derive(Debug)]
pub struct RenameDirectives {
    filepath: String,
    prefix: String,
    bindings: HashMap<DeclId, ReplacementPair>,
    usages: Vec<Usage>,
}

impl RenameDirectives {
    /// Create an empty store for the TU at `filepath`, deriving the rewrite
    /// prefix from `stem` (the TU filename without extension).
    pub fn new(filepath: impl Into<String>, stem: &str) -> Self {
        Self {
            filepath: filepath.into(),
            prefix: rewrite_prefix(stem),
            bindings: HashMap::new(),
            usages: Vec::new(),
        }
    }

    /// The main file of the TU this store belongs to.
    pub fn filepath(&self) -> &str {
        &self.filepath
    }

    /// Record that the declaration `binding` with name `original` is to be
    /// renamed. Later calls for the same declaration overwrite.
    pub fn set_binding(&mut self, original: &str, binding: DeclId) {
        let rewritten = format!("{}_{}", self.prefix, original);
        self.bindings
            .insert(binding, (original.to_string(), rewritten));
    }

    /// Append one usage position. The binding need not exist (yet, or ever);
    /// usages that never resolve are dropped at join time.
    pub fn add_usage(&mut self, location: SourceLocation, original: &str, binding: DeclId) {
        self.usages.push(Usage {
            location,
            name: original.to_string(),
            binding,
        });
    }

    /// All recorded usage positions, in insertion order.
    pub fn usage_positions(&self) -> Vec<(usize, usize)> {
        self.usages.iter().map(|u| (u.location.line, u.location.col)).collect()
    }

    /// Join usages to bindings: an ordered (by location) map from position to
    /// replacement pair. Usages whose binding was never set are fake matches
    /// from overly general patterns and are skipped silently.
    pub fn replacements(&self) -> BTreeMap<SourceLocation, ReplacementPair> {
        let mut out = BTreeMap::new();
        for usage in &self.usages {
            let Some((_, rewritten)) = self.bindings.get(&usage.binding) else {
                continue;
            };
            out.insert(
                usage.location.clone(),
                (usage.name.clone(), rewritten.clone()),
            );
        }
        out
    }
}
