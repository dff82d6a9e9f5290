//! Front-end interface for translation-unit analysis.
//!
//! This module defines the narrow contract the matcher engine needs from a
//! semantic front-end over parsed C-family source:
//!
//! - `TranslationUnit` trait: declarations by category, spelling locations,
//!   linkage, scope and redeclaration relationships
//! - `cpp`: tree-sitter backed implementation for real C/C++ sources
//! - `stub`: programmatic implementation that synthesises declarations in
//!   memory, for tests
//!
//! The engine never inspects front-end internals; declarations are referred
//! to by opaque `DeclId` handles that are only meaningful for the lifetime of
//! one TU analysis.

pub mod cpp;
pub mod stub;

use crate::analysis::SpellingLocation;

/// Opaque, per-TU handle for one named declaration. Two handles compare
/// equal iff the front-end considers them the same declaration node. Never
/// dereferenced by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeclId(pub u32);

/// The declaration categories the match patterns distinguish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclCategory {
    Function,
    Variable,
    /// Class, struct or union.
    Record,
    /// Typedef or alias declaration.
    TypedefName,
}

/// A type spelled out in source: the written position plus the declarations
/// the type may refer to. Both targets can be absent (builtin types), and a
/// present target may still fail the engine's re-match; both cases are
/// dropped silently.
#[derive(Debug, Clone)]
pub struct TypeUsage {
    /// Spelling location of the written type; `None` when invalid.
    pub location: Option<SpellingLocation>,
    /// Referred declaration when the type names a typedef.
    pub typedef_target: Option<DeclId>,
    /// Referred declaration when the type names a record.
    pub record_target: Option<DeclId>,
}

/// A declaration-reference expression: a use of a function or variable name.
#[derive(Debug, Clone)]
pub struct Reference {
    /// Spelling location of the reference; `None` when invalid.
    pub location: Option<SpellingLocation>,
    /// The declaration the name resolves to.
    pub target: DeclId,
}

/// Query interface over one parsed translation unit.
///
/// Implementations wrap a real parser (`cpp::CppFrontEnd`) or synthesise
/// nodes programmatically (`stub::StubTranslationUnit`). All `DeclId`
/// arguments must come from the same TU; handing a foreign id to a query is
/// a programming error.
pub trait TranslationUnit {
    /// Path of the file whose compilation produced this TU.
    fn main_file(&self) -> &str;

    /// Every declaration node, in front-end walk order.
    fn declarations(&self) -> Vec<DeclId>;

    /// Every type spelled in the TU's files.
    fn type_usages(&self) -> Vec<TypeUsage>;

    /// Every declaration-reference expression.
    fn references(&self) -> Vec<Reference>;

    fn category(&self, id: DeclId) -> DeclCategory;

    /// The declaration's identifier, or `None` when it has no plain
    /// identifier (operators, anonymous declarations).
    fn identifier(&self, id: DeclId) -> Option<String>;

    /// Printable name for declarations without an identifier, e.g.
    /// `operator+`. May be empty.
    fn printable_name(&self, id: DeclId) -> String;

    /// Fully qualified name including namespace qualifiers.
    fn qualified_name(&self, id: DeclId) -> String;

    /// Whether the symbol can be named from another TU.
    fn has_external_linkage(&self, id: DeclId) -> bool;

    /// Whether the declaration is expanded in the TU's main file (as opposed
    /// to an included header).
    fn in_main_file(&self, id: DeclId) -> bool;

    /// Whether the declaration's parent scope is the TU root or a namespace
    /// (named or anonymous).
    fn in_globalish_scope(&self, id: DeclId) -> bool;

    fn is_inline_function(&self, id: DeclId) -> bool;

    fn is_class_method(&self, id: DeclId) -> bool;

    fn is_field(&self, id: DeclId) -> bool;

    /// Whether this node is itself a definition (function with body, variable
    /// that is not declaration-only, record with its body here).
    fn is_definition(&self, id: DeclId) -> bool;

    /// Whether this node carries a body: a function body, or a variable's
    /// defining initialiser.
    fn has_body(&self, id: DeclId) -> bool;

    /// For records: whether any declaration in this node's redeclaration
    /// chain is a definition.
    fn has_definition(&self, id: DeclId) -> bool;

    /// The defining declaration of this node's redeclaration chain, if any.
    fn definition(&self, id: DeclId) -> Option<DeclId>;

    /// The previous declaration of the same entity, if any.
    fn previous_declaration(&self, id: DeclId) -> Option<DeclId>;

    /// Spelling location of the declaration's name token; `None` when
    /// invalid.
    fn name_location(&self, id: DeclId) -> Option<SpellingLocation>;

    /// Begin and end spelling locations of the whole declaration; `None`
    /// when invalid. Point-only front-ends report begin == end.
    fn extent(&self, id: DeclId) -> Option<(SpellingLocation, SpellingLocation)>;
}
